//! Pipeline stages behind the workbook endpoints.
//!
//! Each submodule wraps exactly one collaborator or transformation, so each
//! is testable on its own and can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ llm ──▶ postprocess ──▶ pages (client)
//!                                                   │
//! pages + brand ──▶ brand ──▶ html ──▶ export ──▶ PDF
//! ```
//!
//! 1. [`extract`]: PDF text layer or OCR'd image text
//! 2. [`llm`]: single-turn session, text accumulation
//! 3. [`postprocess`]: JSON object extraction with per-call fallback policy
//! 4. [`brand`]: brand kit → CSS custom properties
//! 5. [`html`]: printable workbook document
//! 6. [`export`]: headless browser print to PDF
//! 7. [`sandbox`]: remote code execution, soft-failing

pub mod brand;
pub mod export;
pub mod extract;
pub mod html;
pub mod llm;
pub mod postprocess;
pub mod sandbox;
