use thiserror::Error;

/// Programmer errors raised into Lua.
///
/// Operational failures never take this path; they come back to scripts as
/// `false` or `nil`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("attempt to use a closed handle")]
  Closed,
}

impl From<Error> for mlua::Error {
  fn from(err: Error) -> Self {
    mlua::Error::external(err)
  }
}
