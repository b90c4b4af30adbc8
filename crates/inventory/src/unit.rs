//! Unit of measure and movement kinds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use workshop_core::DomainError;

/// Unit an item's quantity is counted in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Unit,
    Metre,
    Litre,
    Kilogram,
    Box,
    Set,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Unit => "unit",
            Unit::Metre => "metre",
            Unit::Litre => "litre",
            Unit::Kilogram => "kilogram",
            Unit::Box => "box",
            Unit::Set => "set",
        }
    }
}

impl core::fmt::Display for Unit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = DomainError;

    /// Wire names plus the legacy Spanish names (`unidad`, `metro`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" | "unidad" => Ok(Unit::Unit),
            "metre" | "meter" | "metro" => Ok(Unit::Metre),
            "litre" | "liter" | "litro" => Ok(Unit::Litre),
            "kilogram" | "kilogramo" => Ok(Unit::Kilogram),
            "box" | "caja" => Ok(Unit::Box),
            "set" | "juego" => Ok(Unit::Set),
            other => Err(DomainError::field("unit", format!("'{other}' is not a valid choice"))),
        }
    }
}

/// Direction and origin of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Inbound,
    Outbound,
    /// Correction produced by a physical stock count.
    Adjustment,
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Return => "return",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "Inbound",
            MovementKind::Outbound => "Outbound",
            MovementKind::Adjustment => "Adjustment",
            MovementKind::Return => "Return",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" | "entrada" => Ok(MovementKind::Inbound),
            "outbound" | "salida" => Ok(MovementKind::Outbound),
            "adjustment" | "ajuste" => Ok(MovementKind::Adjustment),
            "return" | "devolucion" | "devolución" => Ok(MovementKind::Return),
            other => Err(DomainError::field("kind", format!("'{other}' is not a valid choice"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_accepts_legacy_names() {
        assert_eq!("Caja".parse::<Unit>().unwrap(), Unit::Box);
        assert_eq!("metre".parse::<Unit>().unwrap(), Unit::Metre);
        assert!("gallon".parse::<Unit>().is_err());
    }

    #[test]
    fn movement_kind_round_trips_through_display() {
        for kind in [
            MovementKind::Inbound,
            MovementKind::Outbound,
            MovementKind::Adjustment,
            MovementKind::Return,
        ] {
            assert_eq!(kind.to_string().parse::<MovementKind>().unwrap(), kind);
        }
    }
}
