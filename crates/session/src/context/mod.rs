//! Prompt context pipeline.
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | Retrieval | document path + latest utterance | snippet (possibly empty) |
//! | Assembly | persona + snippet + history + utterance | prompt string |

pub mod assembler;
pub mod retriever;

pub use assembler::{estimate_tokens, PromptAssembler, ASSISTANT_CUE, CONTEXT_HEADER, USER_TAG};
pub use retriever::{extract_snippet, split_lines, ContextRetriever, DEFAULT_WINDOW};
