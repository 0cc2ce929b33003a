// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits describing what the system
// works with: article rows, summary pairs, generation settings.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A row read from the input table and its filtered training form
pub mod article;

// Beam search settings shared by training previews and inference
pub mod generation;

// Core abstractions (traits) that other layers implement
pub mod traits;
