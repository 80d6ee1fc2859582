//! These models represent the objects passed between the caller, the agent and the adapters
//!
//! There are four vendor formats we need to interact with:
//! - openai chat completion messages/tools
//! - anthropic messages/tools
//! - google generateContent contents/function declarations
//! - xai chat completion messages/tools, which follow openai
//!
//! These overlap to varying degrees. Callers and the agent only ever see the internal
//! structs; each adapter converts them to and from its vendor shape at the edge.
pub mod content;
pub mod message;
pub mod request;
pub mod role;
pub mod tool;
