pub mod domain;
pub mod drafts;
pub mod gradebook;
pub mod lesson;
pub mod library;
pub mod ports;
pub mod presentation;
pub mod quiz;
pub mod users;

pub use domain::{
    AttemptStatus, AuthSession, Class, ClassAssignment, ContentItem, ContentType, ContentVersion,
    Lesson, LessonComponent, QuestionType, Quiz, QuizAttempt, QuizOption, QuizQuestion, Role,
    RoleProfile, User, UserCredentials, UserStatus,
};
pub use ports::{
    ClassRepository, ContentRepository, DiscussionPromptService, DraftStore, FileStorage,
    LessonRepository, PortError, PortResult, QuizRepository, ShortAnswerGrader,
    TextToSpeechService, TranslationService, UserRepository,
};
