//! Closed enumerations of bookable centers and classes.
//!
//! The booking provider addresses centers by numeric code while users know
//! them by name; reservations store the code. The class list mirrors what the
//! chain actually offers — requests are validated against it at the API edge,
//! and the scheduling core trusts the stored values.

/// `(public name, provider center code)` pairs.
pub const CENTERS: &[(&str, &str)] = &[("platero", "134")];

pub const CLASSES: &[&str] = &[
    "Body Pump",
    "Cycling",
    "Body Combat",
    "GAP",
    "Virtual Cycling",
    "Zumba",
    "Yoga",
    "Body Balance",
];

/// Provider code for a center name, `None` if unknown.
pub fn center_code(name: &str) -> Option<&'static str> {
    CENTERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Reverse lookup, used when rendering notifications.
pub fn center_name(code: &str) -> Option<&'static str> {
    CENTERS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

pub fn is_known_class(name: &str) -> bool {
    CLASSES.contains(&name)
}

/// Validate a public center name and translate it to the provider code.
pub fn resolve_center(name: &str) -> crate::Result<&'static str> {
    center_code(name).ok_or_else(|| crate::CoreError::UnknownCenter(name.to_string()))
}

/// Validate a class name against the closed list.
pub fn validate_class(name: &str) -> crate::Result<()> {
    if is_known_class(name) {
        Ok(())
    } else {
        Err(crate::CoreError::UnknownClass(name.to_string()))
    }
}
