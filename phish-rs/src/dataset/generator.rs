//! Synthetic labeled corpus
//!
//! Produces bilingual (Indonesian/English) normal, spam and phishing messages
//! for bootstrapping a model without a real labeled mailbox.

use chrono::{Duration, Local};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::types::{EmailRecord, Language};
use crate::classifier::Label;

const REAL_SENDERS: &[&str] = &[
    "google.com",
    "bri.co.id",
    "mandiri.co.id",
    "kemdikbud.go.id",
    "bca.co.id",
    "gmail.com",
    "tokopedia.com",
    "shopee.co.id",
    "amazon.com",
    "apple.com",
    "microsoft.com",
    "paypal.com",
    "linkedin.com",
    "booking.com",
];

const FAKE_SENDERS: &[&str] = &[
    "secure-login-confirm.net",
    "account-verification-alert.com",
    "id-update-security.cc",
    "data-update-login.info",
    "payment-claim-online.ru",
    "suspicious-access-alert.xyz",
];

const SUBJECTS_NORMAL_ID: &[&str] = &[
    "Informasi Pembayaran",
    "Notifikasi Sistem",
    "Konfirmasi Data",
    "Undangan Rapat",
    "Laporan Bulanan",
    "Pengumuman Resmi",
    "Tanda Terima",
];
const SUBJECTS_NORMAL_EN: &[&str] = &[
    "Payment Information",
    "System Notification",
    "Data Confirmation",
    "Meeting Invitation",
    "Monthly Report",
    "Policy Update",
    "Receipt Confirmation",
];
const SUBJECTS_SPAM_ID: &[&str] = &[
    "GRATIS Hadiah iPhone!",
    "Dapatkan uang sekarang",
    "Bonus saldo sampai 50 juta!",
    "Promo waktu terbatas!",
];
const SUBJECTS_SPAM_EN: &[&str] = &[
    "FREE iPhone Today!",
    "You just won $10,000!",
    "Limited Time Promotion",
    "Click now and get your reward!",
];
const SUBJECTS_PHISHING_ID: &[&str] = &[
    "Akun Anda terblokir - Segera verifikasi",
    "Aktivitas mencurigakan terdeteksi",
    "Pembayaran tertunda - butuh tindakan",
    "Pembaruan keamanan wajib dilakukan",
];
const SUBJECTS_PHISHING_EN: &[&str] = &[
    "Your account has been suspended",
    "Unusual sign-in detected",
    "Payment on hold – verification required",
    "Security update required",
];

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in", "reprehenderit",
    "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur", "excepteur", "sint",
    "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui", "officia", "deserunt",
    "mollit", "anim", "id", "est", "laborum",
];

/// Label weights `normal/spam/phishing`
const LABEL_WEIGHTS: [(Label, u32); 3] = [(Label::Normal, 65), (Label::Spam, 20), (Label::Phishing, 15)];

/// Language weights `id/en`
const LANGUAGE_WEIGHTS: [(Language, u32); 2] = [(Language::Id, 60), (Language::En, 40)];

/// Seeded generator for synthetic training records
pub struct DatasetGenerator {
    rng: StdRng,
}

impl DatasetGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self, count: usize) -> Vec<EmailRecord> {
        (0..count).map(|_| self.record()).collect()
    }

    /// One record with a randomly drawn label and language
    pub fn record(&mut self) -> EmailRecord {
        let label = weighted(&mut self.rng, &LABEL_WEIGHTS);
        let language = weighted(&mut self.rng, &LANGUAGE_WEIGHTS);
        self.record_for(label, language)
    }

    pub fn record_for(&mut self, label: Label, language: Language) -> EmailRecord {
        let (local, domains, subjects) = match (label, language) {
            (Label::Normal, Language::Id) => ("noreply", REAL_SENDERS, SUBJECTS_NORMAL_ID),
            (Label::Normal, Language::En) => ("noreply", REAL_SENDERS, SUBJECTS_NORMAL_EN),
            (Label::Spam, Language::Id) => ("promo", FAKE_SENDERS, SUBJECTS_SPAM_ID),
            (Label::Spam, Language::En) => ("promo", FAKE_SENDERS, SUBJECTS_SPAM_EN),
            (Label::Phishing, Language::Id) => ("security", FAKE_SENDERS, SUBJECTS_PHISHING_ID),
            (Label::Phishing, Language::En) => ("security", FAKE_SENDERS, SUBJECTS_PHISHING_EN),
        };

        let sender = format!("{}@{}", local, self.pick(domains));
        let subject = self.pick(subjects).to_string();
        let body = self.body(label, language);

        EmailRecord {
            date: self.date(),
            sender,
            subject,
            body,
            language: Some(language),
            label,
        }
    }

    fn body(&mut self, label: Label, language: Language) -> String {
        match (label, language) {
            (Label::Normal, Language::Id) => format!(
                "Halo,\n\n{}\n\nJika ada pertanyaan silakan balas email ini.\n\nTerima kasih.",
                self.paragraph()
            ),
            (Label::Normal, Language::En) => format!(
                "Hello,\n\n{}\n\nIf you have any questions, feel free to reply to this email.\n\nThank you.",
                self.paragraph()
            ),
            (Label::Spam, Language::Id) => format!(
                "SELAMAT!!! Anda menang undian nasional!\nKunjungi link berikut untuk klaim hadiah:\nhttp://promo-{}.click",
                self.rng.gen_range(1000..=9999)
            ),
            (Label::Spam, Language::En) => format!(
                "CONGRATULATIONS!!! You have been selected!\nClaim your reward now:\nhttp://reward-{}.claim",
                self.rng.gen_range(1000..=9999)
            ),
            (Label::Phishing, lang) => {
                let link = format!("http://{}/verify", self.pick(FAKE_SENDERS));
                match lang {
                    Language::Id => format!(
                        "Penting!\n\nAkun Anda terdeteksi aktivitas tidak wajar. Harap verifikasi melalui tautan berikut:\n\n{}\n\nAbaikan email ini jika sudah melakukan verifikasi.",
                        link
                    ),
                    Language::En => format!(
                        "Important!\n\nYour account has detected unusual activity. Please verify using the link below:\n\n{}\n\nIf you already verified, please ignore this email.",
                        link
                    ),
                }
            }
        }
    }

    /// A few capitalized pseudo-Latin sentences
    fn paragraph(&mut self) -> String {
        let sentences = self.rng.gen_range(4..=8);
        let mut out = Vec::with_capacity(sentences);
        for _ in 0..sentences {
            let words = self.rng.gen_range(6..=14);
            let mut sentence: Vec<&str> = (0..words).map(|_| self.pick(LOREM_WORDS)).collect();
            let first = capitalize(sentence[0]);
            sentence[0] = &first;
            out.push(format!("{}.", sentence.join(" ")));
        }
        out.join(" ")
    }

    fn date(&mut self) -> String {
        let days = self.rng.gen_range(0..=730);
        (Local::now() - Duration::days(days))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }
}

fn weighted<T: Copy>(rng: &mut StdRng, table: &[(T, u32)]) -> T {
    let total: u32 = table.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for &(item, weight) in table {
        if roll < weight {
            return item;
        }
        roll -= weight;
    }
    table[table.len() - 1].0
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
