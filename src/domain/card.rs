//! Masking of card numbers and PINs for logs and reports.

/// Masks a card number down to its last four characters.
///
/// `"4532015112830366"` becomes `"************0366"`. Counts characters,
/// not bytes: the input is caller-supplied and reaches here before any
/// format validation.
pub fn mask_card_number(card_number: &str) -> String {
    let length = card_number.chars().count();
    if length < 4 {
        return "****".to_string();
    }
    let visible: String = card_number.chars().skip(length - 4).collect();
    format!("{}{visible}", "*".repeat(length - 4))
}

/// Masks a PIN completely, preserving its length.
pub fn mask_pin(pin: &str) -> String {
    if pin.is_empty() {
        return "****".to_string();
    }
    "*".repeat(pin.len())
}
