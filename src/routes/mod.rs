/// Router Module Index
///
/// Routes are grouped by the access tier they require. Each group is mounted
/// under `/api` by `create_router`, with its guard applied as a route layer.

/// Anonymous-friendly reads and the sign-in endpoints.
/// Handlers personalise output through `MaybeUser` when a session exists.
pub mod public;

/// Routes behind the authentication middleware. Role and ownership checks
/// are made inside the handlers.
pub mod authenticated;

/// Dashboard routes behind the staff gate.
pub mod admin;
