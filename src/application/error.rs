#[derive(Debug)]
pub enum ApplicationError {
    NotFound,
    BadRequest(String),
    Conflict(String),
    PayloadTooLarge,
    InternalError(String),
}
