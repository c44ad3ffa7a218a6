//! # Redaction
//!
//! Pattern-based removal of personally identifying text from complaints.
//!
//! Every match is replaced by a fixed bracketed placeholder; everything
//! outside a matched span is left byte-for-byte intact. Redaction never
//! fails: text without a recognisable pattern comes back unchanged.
//!
//! ## Category order
//!
//! Categories are resolved in this fixed priority order, and a span claimed
//! by an earlier category is never considered by a later one:
//!
//! 1. `[EMAIL]`
//! 2. `[PROTOCOLO]`
//! 3. `[CHASSI]`
//! 4. `[CPF]`
//! 5. `[PLACA]`
//! 6. `[TELEFONE]`
//! 7. `[NOME]`
//!
//! Inside one category the longest candidate wins, then the leftmost.
//!
//! Redacting already-redacted text is a no-op: no pattern can match inside a
//! placeholder, and `redact` repeats its pass until the text stops changing.

mod patterns;
mod redactor;

pub use redactor::{redact, redact_with_report, PiiCategory, Redaction};
