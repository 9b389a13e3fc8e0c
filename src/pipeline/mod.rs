//! Stages of the extraction run.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the OCR and model steps can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ llm ──▶ postprocess
//! (path)    (pdfium)   (text)  (model)  (JSON page)
//! ```
//!
//! 1. [`input`]  — validate the guidebook PDF and name its output folder
//! 2. [`render`] — rasterise selected pages to `page_{N}.png`; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`ocr`]    — recognise page text, cached as `page_{N}.txt`
//! 4. [`llm`]    — turn page text into routes with retry/backoff; the only
//!    stage with network I/O. [`encode`] wraps the page image when it is
//!    sent along
//! 5. [`postprocess`] — strip fences and chatter from the reply and parse it

pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
