/// Router Module Index
///
/// Splits routing by access level. Access control is attached at the module level
/// (via Axum layers in `create_router`), so a handler cannot end up public by accident.

/// Routes accessible to everyone (anonymous reads, signup, signin).
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware. Ownership of the
/// targeted article is checked inside the lifecycle manager.
pub mod authenticated;
