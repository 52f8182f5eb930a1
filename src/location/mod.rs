//! Location codec.
//!
//! # Data Flow
//! ```text
//! history provider location ("/app/users/7?tab=info&_side=/help")
//!     → Location { pathname, search }
//!     → strip_prefix (prefix filter)
//!     → Query::parse (ordered, last duplicate wins)
//!     → matcher consumes the prefix-stripped pathname
//! ```
//!
//! # Design Decisions
//! - Locations are plain values compared structurally
//! - Query decoding is form-urlencoded (via the `url` crate)
//! - The leading `?` is not part of the stored search string

pub mod codec;

pub use codec::{normalize_prefix, strip_prefix, Location, Query};
