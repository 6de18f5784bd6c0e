//! 策略引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// 策略源无法加载或校验失败
    #[error("策略加载失败: {0}")]
    Load(String),

    /// 规则类型未注册
    #[error("未知规则类型: {0}")]
    UnknownRule(String),

    /// 规则定义不符合其类型要求
    #[error("规则语法错误: {0}")]
    Syntax(String),

    /// 规则执行期间失败（严格模式缺值、未知操作符、类型不可比较）
    #[error("规则执行失败: {0}")]
    Evaluation(String),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("读取策略文件失败: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    /// 是否属于加载/校验类错误
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Json(_) | Self::Io(_))
    }

    /// 未知规则类型时返回该类型名
    pub fn unknown_rule_type(&self) -> Option<&str> {
        match self {
            Self::UnknownRule(type_name) => Some(type_name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
