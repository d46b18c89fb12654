//! Prerender nginx Configuration Parser
//!
//! Reads nginx configuration files (following `include` directives) into
//! the directive trees of `prerender-nginx-core`, and writes them back.
//!
//! # Example
//!
//! ```rust,ignore
//! use prerender_nginx_config::{build, load};
//!
//! let set = load("/etc/nginx/nginx.conf")?;
//! let main = set.main().unwrap();
//! println!("{}", build(&main.directives));
//! ```

pub mod builder;
pub mod diagnostics;
pub mod loader;
pub mod parser;
pub mod writer;

pub use builder::build;
pub use diagnostics::render_issue;
pub use loader::{load, parse_document, LoadError};
pub use parser::{parse, tokenize, LexError, ParseError, Token};
pub use writer::FileWriter;
