//! Pipeline stages for markdown-to-PDF conversion.
//!
//! Each submodule implements one step; [`crate::convert`] strings them
//! together per request.
//!
//! ## Data Flow
//!
//! ```text
//! markdown ──▶ render ──▶ paginate ──▶ PDF file
//!               │  ▲          │
//!      highlight┘  └style     └── browser session (one per call)
//! ```
//!
//! 1. [`render`]   : markdown to a complete HTML document; pure and synchronous
//! 2. [`highlight`]: code blocks to class-tagged spans, with plain-text fallback
//! 3. [`style`]    : the print stylesheet and the post-load colour reapplication
//! 4. [`paginate`] : load into a headless page, measure, print one tall page
//! 5. [`naming`]   : `{name}-{timestamp}` file names for generated PDFs

pub mod highlight;
pub mod naming;
pub mod paginate;
pub mod render;
pub mod style;
