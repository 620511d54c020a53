use serde::{Deserialize, Serialize};

/// Tensor memory layouts named by operator descriptions.
///
/// `FractalNz` is the tiled layout used by the accelerator backends under
/// test; everything else is plain row-major with different axis conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TensorFormat {
    #[default]
    #[serde(rename = "DefaultFormat")]
    Default,
    #[serde(rename = "NCHW")]
    Nchw,
    #[serde(rename = "NHWC")]
    Nhwc,
    #[serde(rename = "FRACTAL_NZ")]
    FractalNz,
}

impl TensorFormat {
    pub fn is_fractal(self) -> bool {
        matches!(self, TensorFormat::FractalNz)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TensorFormat::Default => "DefaultFormat",
            TensorFormat::Nchw => "NCHW",
            TensorFormat::Nhwc => "NHWC",
            TensorFormat::FractalNz => "FRACTAL_NZ",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "DefaultFormat" => Some(TensorFormat::Default),
            "NCHW" => Some(TensorFormat::Nchw),
            "NHWC" => Some(TensorFormat::Nhwc),
            "FRACTAL_NZ" => Some(TensorFormat::FractalNz),
            _ => None,
        }
    }
}

impl std::fmt::Display for TensorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
