//! Chat message model shared by the harness and the completion client.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Immutable, cheaply cloned message list. Every clone points at the same
/// allocation, so all requests in a run carry the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(Arc<[ChatMessage]>);

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self(messages.into())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(default_conversation())
    }
}

const SYSTEM_PROMPT: &str = "Act as a helpful Assistant.\nToday's date is July 2, 2024.\n";

const PERSONA_PROMPT: &str = "You are helpful Assistant for Crescendo, a company that provides a full-stack CX service with the most advanced Generative AI technology integrated with our human-in-the-loop service.\n\
Refer to yourself as Assistant. \nYou are talking with a user who is a potential lead.\n\
You are provided with the information about Crescendo in the Context below. \nAnswer questions about Crescendo.\n\
Politely reject to answer questions on any other topics.\n\
Use only the information provided to you in the context below and in further messages.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
Make your answers short.\n";

const GREETING: &str = "Hello! How can we help?";

const CONTEXT_PROMPT: &str = "Use the following pieces of context to reply to User Message at the end.\n\n\
Crescendo is a company that integrates AI and human expertise to enhance customer experience (CX), distinguishing itself by charging only for successful outcomes. \
Crescendo offers a full-stack CX service with the most advanced Generative AI technology integrated with our human-in-the-loop service. \
Crescendo provides CX Messaging Assistant which is a digital assistant that can engage customers in conversations about products or services, \
CX Voice Assistant is a virtual agent application that can answer phone calls for your enterprise, \
CX Insights which is a CX operational dashboard that includes 100% Voice of Customer (VoC) coverage for all interactions handled by Crescendo.  \
Crescendo\u{2019}s AI powered analysis includes common VoC metrics such as Net Promotor Score (NPS) and Customer Satisfaction (CSAT).  \
The CX Insights application also summarizes all conversations and produces business insights based on conversation transcripts.\n\n\n\
Continue conversation replying to User Message.\n\n\
User Message:\n\
what services Crescendo provides ?";

/// The built-in workload: a short support-assistant exchange ending in a user question.
pub fn default_conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(Role::System, SYSTEM_PROMPT),
        ChatMessage::new(Role::User, PERSONA_PROMPT),
        ChatMessage::new(Role::Assistant, GREETING),
        ChatMessage::new(Role::User, CONTEXT_PROMPT),
    ]
}
