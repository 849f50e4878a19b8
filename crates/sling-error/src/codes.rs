// Error codes
// Setup codes start at 1000, hook codes at 2000, runtime at 3000, config at 4000

use crate::ErrorCode;

pub const DUPLICATE_FINALLY: ErrorCode = ErrorCode(1001);
pub const CLAUSE_AFTER_FINALLY: ErrorCode = ErrorCode(1002);
pub const UNRESOLVED_TYPE: ErrorCode = ErrorCode(1003);
pub const KEY_VALUE_ARITY: ErrorCode = ErrorCode(1004);
pub const MALFORMED_SELECTOR: ErrorCode = ErrorCode(1005);
pub const DUPLICATE_TYPE_NAME: ErrorCode = ErrorCode(1006);

pub const RETURN_TYPE: ErrorCode = ErrorCode(2001);

pub const NO_ACTIVE_HANDLER: ErrorCode = ErrorCode(3001);

pub const ALREADY_CONFIGURED: ErrorCode = ErrorCode(4001);
pub const INVALID_CONFIG: ErrorCode = ErrorCode(4002);
