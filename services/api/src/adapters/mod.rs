pub mod chat;
pub mod db;
pub mod discussion_llm;
pub mod drafts;
pub mod grading_llm;
pub mod storage;
pub mod translate_llm;
pub mod tts;

pub use db::DbAdapter;
pub use discussion_llm::OpenAiDiscussionAdapter;
pub use drafts::InMemoryDraftStore;
pub use grading_llm::OpenAiGradingAdapter;
pub use storage::LocalFileStorage;
pub use translate_llm::OpenAiTranslationAdapter;
pub use tts::OpenAiTtsAdapter;
