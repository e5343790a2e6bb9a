// handlers/mod.rs - two access tiers
//
// Public (no auth) and protected (JWT). Admin and ownership checks happen
// inside the protected handlers via `AuthUser`.

pub mod protected;
pub mod public;
pub mod validation;
