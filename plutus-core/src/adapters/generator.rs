//! Fake row generator for seeding and simulation
//!
//! Rows are plausible rather than realistic: eurozone countries, well-formed
//! BICs, balances and amounts drawn uniformly in whole cents. Callers choose
//! the currency.

use chrono::{Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;

use crate::domain::{Account, Bank, BankId, User, UserId, EUROZONE_COUNTRIES};

const FIRST_NAMES: &[&str] = &[
    "Anna", "Luca", "Sofia", "Mateo", "Emma", "Jonas", "Lea", "Noah", "Marie", "Elias", "Giulia",
    "Hugo", "Sara", "Paul", "Ines", "Mikael", "Eva", "Tomas", "Clara", "Nikos",
];

const LAST_NAMES: &[&str] = &[
    "Müller", "Rossi", "García", "Martin", "Janssens", "Virtanen", "Papadopoulos", "Murphy",
    "Novak", "Silva", "Schmit", "Borg", "Kask", "Bērziņš", "Kazlauskas", "Horvat", "Dubois",
    "Fischer", "Ferrari", "de Vries",
];

const BANK_NAME_STEMS: &[&str] = &[
    "Alpine", "Baltic", "Meridian", "Harbor", "Continental", "Atlas", "Northstar", "Danube",
    "Aegean", "Iberian", "Rhine", "Lagoon",
];

const BANK_NAME_SUFFIXES: &[&str] = &["Bank", "Savings", "Capital", "Credit Union", "Finance"];

const ALPHA: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Uniform decimal in `[low, high)` with two fractional digits
fn uniform_cents<R: Rng + ?Sized>(rng: &mut R, low: i64, high: i64) -> Decimal {
    Decimal::new(rng.gen_range(low * 100..high * 100), 2)
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn random_chars<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// BIC: 4-letter institution, country, 2-character location, optional branch
pub fn generate_bic_code<R: Rng + ?Sized>(rng: &mut R, country: &str) -> String {
    let institution = random_chars(rng, ALPHA, 4);
    let location = random_chars(rng, ALPHANUMERIC, 2);
    let branch = if rng.gen_bool(0.5) {
        random_chars(rng, ALPHANUMERIC, 3)
    } else {
        String::new()
    };
    format!("{}{}{}{}", institution, country, location, branch)
}

fn days_ago(days: i64) -> NaiveDate {
    (Utc::now() - Duration::days(days)).date_naive()
}

pub fn generate_bank<R: Rng + ?Sized>(rng: &mut R, currency: &str) -> Bank {
    let now = Utc::now();
    let country = pick(rng, EUROZONE_COUNTRIES).to_string();
    let name = format!(
        "{} {}",
        pick(rng, BANK_NAME_STEMS),
        pick(rng, BANK_NAME_SUFFIXES)
    );

    Bank {
        id: BankId(0),
        name,
        bic_code: generate_bic_code(rng, &country),
        country,
        currency: Account::normalize_currency(currency),
        established_date: days_ago(rng.gen_range(0..=100 * 365)),
        total_assets: uniform_cents(rng, 100_000_000, 1_000_000_000),
        total_liabilities: uniform_cents(rng, 10_000_000, 1_000_000_000),
        created_at: now,
        updated_at: now,
    }
}

/// An adult holder; nationality matches the country of residence
pub fn generate_user<R: Rng + ?Sized>(rng: &mut R) -> User {
    let now = Utc::now();
    let country = pick(rng, EUROZONE_COUNTRIES).to_string();

    User {
        id: UserId(0),
        first_name: pick(rng, FIRST_NAMES).to_string(),
        last_name: pick(rng, LAST_NAMES).to_string(),
        date_of_birth: days_ago(rng.gen_range(18 * 365 + 5..=100 * 365)),
        nationality: country.clone(),
        country,
        created_at: now,
        updated_at: now,
    }
}

/// Active checking account with a balance in [100, 1 000 000)
pub fn generate_account<R: Rng + ?Sized>(
    rng: &mut R,
    user_id: UserId,
    bank_id: BankId,
    currency: &str,
) -> Account {
    Account::new(user_id, bank_id, currency, uniform_cents(rng, 100, 1_000_000))
}

/// Transfer amount in [10, 1 000)
pub fn generate_amount<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    uniform_cents(rng, 10, 1_000)
}
