use serde::Serialize;

use crate::error::InputError;

/// 分析フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 分割精読
    Extracting = 1,
    /// 構造マッピング
    Mapping = 2,
    /// 採点
    Scoring = 3,
    /// 逆方向検証
    Verifying = 4,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Extracting,
        Phase::Mapping,
        Phase::Scoring,
        Phase::Verifying,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Extracting => "分割精読",
            Phase::Mapping => "構造マッピング",
            Phase::Scoring => "採点",
            Phase::Verifying => "逆方向検証",
        }
    }

    pub fn from_number(number: u8) -> Result<Self, InputError> {
        Phase::ALL
            .into_iter()
            .find(|p| p.number() == number)
            .ok_or(InputError::InvalidPhase(number))
    }

    /// 失敗したらパイプライン全体を打ち切るフェーズか
    pub fn is_critical(self) -> bool {
        matches!(self, Phase::Mapping | Phase::Scoring)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Phase {}: {}", self.number(), self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_number() {
        assert_eq!(Phase::from_number(3), Ok(Phase::Scoring));
        assert_eq!(Phase::from_number(0), Err(InputError::InvalidPhase(0)));
        assert_eq!(Phase::from_number(5), Err(InputError::InvalidPhase(5)));
    }

    #[test]
    fn test_critical_phases() {
        assert!(!Phase::Extracting.is_critical());
        assert!(Phase::Mapping.is_critical());
        assert!(Phase::Scoring.is_critical());
        assert!(!Phase::Verifying.is_critical());
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::Mapping.to_string(), "Phase 2: 構造マッピング");
    }
}
