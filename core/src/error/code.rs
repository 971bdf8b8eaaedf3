/// Stable numeric error codes exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    ValidationError = 3,
    DuplicateTask = 10,
    DependencyError = 11,
    CircularDependency = 12,
    BudgetExceeded = 13,
    HandlerNotFound = 20,
    NoDataSource = 21,
    Timeout = 30,
    Cancelled = 31,
    StageError = 40,
    StrategyError = 41,
    InvalidTransition = 50,
    NotPaused = 60,
    RecentViolations = 61,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
