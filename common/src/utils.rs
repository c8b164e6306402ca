// Common Crate - utils.rs
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across services
pub fn setup_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already installed");
    }
}

/// Canonical form for wallet addresses: trimmed and lower-cased
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// `0x` followed by exactly 40 hex digits
pub fn is_wallet_address(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.len() == 42
        && (candidate.starts_with("0x") || candidate.starts_with("0X"))
        && candidate[2..].chars().all(|c| c.is_ascii_hexdigit())
}
