use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarcodeFormat {
    UpcA,
    UpcE,
    Ean13,
    Ean8,
    Code128,
    Code39,
    Qr,
    DataMatrix,
    Itf,
    Codabar,
    Unknown,
}

impl BarcodeFormat {
    /// Every concrete format, i.e. everything except `Unknown`.
    pub const ALL: [BarcodeFormat; 10] = [
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::Qr,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Itf,
        BarcodeFormat::Codabar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Code128 => "Code-128",
            BarcodeFormat::Code39 => "Code-39",
            BarcodeFormat::Qr => "QR",
            BarcodeFormat::DataMatrix => "DataMatrix",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::Codabar => "Codabar",
            BarcodeFormat::Unknown => "Unknown",
        }
    }

    /// Lenient parse of the names decoding libraries report
    /// (`ean_13`, `EAN-13`, `qr_code`, `CODE128`, ...). Never fails.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(|c| c.to_lowercase())
            .collect();

        match normalized.as_str() {
            "upca" | "upc" => BarcodeFormat::UpcA,
            "upce" => BarcodeFormat::UpcE,
            "ean13" | "ean" => BarcodeFormat::Ean13,
            "ean8" => BarcodeFormat::Ean8,
            "code128" => BarcodeFormat::Code128,
            "code39" => BarcodeFormat::Code39,
            "qr" | "qrcode" => BarcodeFormat::Qr,
            "datamatrix" => BarcodeFormat::DataMatrix,
            "itf" | "interleaved2of5" | "i2of5" => BarcodeFormat::Itf,
            "codabar" => BarcodeFormat::Codabar,
            _ => BarcodeFormat::Unknown,
        }
    }
}

impl Default for BarcodeFormat {
    fn default() -> Self {
        BarcodeFormat::Unknown
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarcodeFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl Serialize for BarcodeFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BarcodeFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}
