/// Default session anchor for equity-style symbols (09:30).
pub const EQUITY_ANCHOR_MINUTES: u32 = 9 * 60 + 30;
/// Default session anchor for futures-style symbols (18:00, Globex open).
pub const FUTURES_ANCHOR_MINUTES: u32 = 18 * 60;

const FUTURES_ROOTS: &[&str] = &[
    "ES", "NQ", "YM", "RTY", "MES", "MNQ", "MYM", "M2K", "CL", "MCL", "NG", "GC", "MGC", "SI",
    "HG", "ZB", "ZN", "ZF", "ZT", "ZC", "ZS", "ZW", "6E", "6J", "6B", "6A", "6C", "VX",
];

const MONTH_CODES: &[char] = &['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

pub fn default_anchor_minutes(ticker: &str) -> u32 {
    if is_futures_symbol(ticker) {
        FUTURES_ANCHOR_MINUTES
    } else {
        EQUITY_ANCHOR_MINUTES
    }
}

/// Symbol heuristic: `/ES`, `ES=F`, `ES1!`, or a known root followed by a
/// month code and year (`ESZ4`, `NQH25`).
pub fn is_futures_symbol(ticker: &str) -> bool {
    let symbol = ticker.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return false;
    }
    if symbol.starts_with('/') || symbol.ends_with("=F") {
        return true;
    }
    if symbol.ends_with("1!") || symbol.ends_with("2!") {
        return true;
    }
    FUTURES_ROOTS.iter().any(|root| {
        symbol
            .strip_prefix(*root)
            .is_some_and(is_contract_suffix)
    })
}

fn is_contract_suffix(rest: &str) -> bool {
    let mut chars = rest.chars();
    let Some(month) = chars.next() else {
        return false;
    };
    let year = chars.as_str();
    MONTH_CODES.contains(&month)
        && (1..=2).contains(&year.len())
        && year.chars().all(|c| c.is_ascii_digit())
}
