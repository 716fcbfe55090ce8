//! services/api/src/web/presentation_task.rs
//!
//! Drives one slide presentation over a socket: navigation input, completion
//! tracking and on-demand translation and speech of the current slide.

use classroom_core::lesson::{LessonComponentContent, Slide};
use classroom_core::ports::{LessonRepository, PortError, TextToSpeechService, TranslationService};
use classroom_core::presentation::{command_for_key, command_for_swipe, NavCommand, SlideNavigator};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::web::protocol::{PresentationClientMessage, PresentationOutput, PresentationServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("Component {0} is not a slide presentation")]
    NotSlides(Uuid),
    #[error("The presentation has no slides")]
    Empty,
    #[error("No presentation is open on this connection")]
    NotOpen,
}

struct OpenDeck {
    component_id: Uuid,
    slides: Vec<Slide>,
    navigator: SlideNavigator,
}

impl OpenDeck {
    fn current(&self) -> Option<&Slide> {
        self.slides.get(self.navigator.index())
    }
}

pub struct PresentationRuntime {
    /// Staff may open disabled components for preview.
    can_preview: bool,
    deck: Mutex<Option<OpenDeck>>,
    lessons: Arc<dyn LessonRepository>,
    translator: Arc<dyn TranslationService>,
    tts: Arc<dyn TextToSpeechService>,
    outbox: mpsc::UnboundedSender<PresentationOutput>,
}

impl PresentationRuntime {
    pub fn new(
        can_preview: bool,
        lessons: Arc<dyn LessonRepository>,
        translator: Arc<dyn TranslationService>,
        tts: Arc<dyn TextToSpeechService>,
        outbox: mpsc::UnboundedSender<PresentationOutput>,
    ) -> Self {
        Self {
            can_preview,
            deck: Mutex::new(None),
            lessons,
            translator,
            tts,
            outbox,
        }
    }

    fn send(&self, message: PresentationServerMessage) {
        if self.outbox.send(PresentationOutput::Message(message)).is_err() {
            warn!("Presentation socket is gone; dropping message");
        }
    }

    pub async fn handle_message(&self, message: PresentationClientMessage) {
        let result = match message {
            PresentationClientMessage::Open { component_id } => self.open(component_id).await,
            PresentationClientMessage::Key { key } => match command_for_key(&key) {
                Some(command) => self.navigate(command).await,
                None => Ok(()),
            },
            PresentationClientMessage::Swipe { delta_x } => match command_for_swipe(delta_x) {
                Some(command) => self.navigate(command).await,
                None => Ok(()),
            },
            PresentationClientMessage::GoTo { index } => self.navigate(NavCommand::GoTo(index)).await,
            PresentationClientMessage::Translate { target_language } => {
                self.translate(target_language).await
            }
            PresentationClientMessage::Speak => self.speak().await,
        };
        if let Err(e) = result {
            warn!("Presentation message rejected: {}", e);
            self.send(PresentationServerMessage::Error {
                message: e.to_string(),
            });
        }
    }

    async fn open(&self, component_id: Uuid) -> Result<(), PresentationError> {
        let component = self.lessons.get_component(component_id).await?;
        if !component.enabled && !self.can_preview {
            return Err(PortError::NotFound(format!("Component {} not found", component_id)).into());
        }
        let LessonComponentContent::Slides(content) = component.content else {
            return Err(PresentationError::NotSlides(component_id));
        };
        if content.slides.is_empty() {
            return Err(PresentationError::Empty);
        }

        let navigator = SlideNavigator::new(content.slides.len(), content.require_full_viewing);
        let deck = OpenDeck {
            component_id,
            slides: content.slides,
            navigator,
        };
        info!("Presentation {} opened ({} slides)", component_id, deck.slides.len());

        let state = deck.navigator.opening_state();
        let completed_now = state.completed_now;
        self.send(PresentationServerMessage::Opened {
            component_id,
            title: component.title,
            state,
            slide: deck.current().cloned(),
            read_aloud: component.read_aloud,
            language_code: component.language_code,
        });
        if completed_now {
            info!("Presentation {} completed", component_id);
            self.send(PresentationServerMessage::Completed { component_id });
        }
        *self.deck.lock().await = Some(deck);
        Ok(())
    }

    async fn navigate(&self, command: NavCommand) -> Result<(), PresentationError> {
        let mut guard = self.deck.lock().await;
        let deck = guard.as_mut().ok_or(PresentationError::NotOpen)?;
        let state = deck.navigator.apply(command);
        let completed_now = state.completed_now;
        self.send(PresentationServerMessage::Navigated {
            slide: deck.current().cloned(),
            state,
        });
        if completed_now {
            info!("Presentation {} completed", deck.component_id);
            self.send(PresentationServerMessage::Completed {
                component_id: deck.component_id,
            });
        }
        Ok(())
    }

    /// Index and spoken text of the current slide.
    async fn current_text(&self) -> Result<(usize, String), PresentationError> {
        let guard = self.deck.lock().await;
        let deck = guard.as_ref().ok_or(PresentationError::NotOpen)?;
        let slide = deck.current().ok_or(PresentationError::Empty)?;
        Ok((deck.navigator.index(), slide.spoken_text()))
    }

    async fn translate(&self, target_language: String) -> Result<(), PresentationError> {
        let (index, text) = self.current_text().await?;
        let text = self.translator.translate(&text, target_language.trim()).await?;
        self.send(PresentationServerMessage::Translation {
            index,
            target_language,
            text,
        });
        Ok(())
    }

    async fn speak(&self) -> Result<(), PresentationError> {
        let (index, text) = self.current_text().await?;
        let audio = self.tts.generate_audio(&text).await?;
        self.send(PresentationServerMessage::SpeechStarted { index });
        if self.outbox.send(PresentationOutput::Audio(audio)).is_err() {
            warn!("Presentation socket is gone; dropping audio");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use classroom_core::domain::{Lesson, LessonComponent};
    use classroom_core::lesson::{ComponentType, SlidesContent};
    use classroom_core::ports::PortResult;

    struct OneComponent(LessonComponent);

    #[async_trait]
    impl LessonRepository for OneComponent {
        async fn create_lesson(&self, lesson: Lesson) -> PortResult<Lesson> {
            Ok(lesson)
        }
        async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
            Err(PortError::NotFound(format!("Lesson {} not found", lesson_id)))
        }
        async fn list_lessons(&self) -> PortResult<Vec<Lesson>> {
            Ok(Vec::new())
        }
        async fn list_components(&self, _lesson_id: Uuid) -> PortResult<Vec<LessonComponent>> {
            Ok(vec![self.0.clone()])
        }
        async fn get_component(&self, component_id: Uuid) -> PortResult<LessonComponent> {
            if component_id == self.0.id {
                Ok(self.0.clone())
            } else {
                Err(PortError::NotFound(format!("Component {} not found", component_id)))
            }
        }
        async fn save_component(&self, _component: &LessonComponent) -> PortResult<()> {
            Ok(())
        }
        async fn delete_component(&self, _component_id: Uuid) -> PortResult<()> {
            Ok(())
        }
        async fn update_component_orders(&self, _orders: &[(Uuid, i32)]) -> PortResult<()> {
            Ok(())
        }
    }

    struct Shouting;

    #[async_trait]
    impl TranslationService for Shouting {
        async fn translate(&self, text: &str, _target_language: &str) -> PortResult<String> {
            Ok(text.to_uppercase())
        }
    }

    struct Beep;

    #[async_trait]
    impl TextToSpeechService for Beep {
        async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    fn slide(title: &str, body: &str) -> Slide {
        Slide {
            title: title.into(),
            body: body.into(),
            ..Slide::default()
        }
    }

    fn deck_component(enabled: bool) -> LessonComponent {
        let slides = vec![
            slide("Solids", "Particles vibrate in place"),
            slide("Liquids", "Particles slide past each other"),
            slide("Gases", "Particles move freely"),
        ];
        slides_component(slides, true, enabled)
    }

    fn slides_component(slides: Vec<Slide>, require_full_viewing: bool, enabled: bool) -> LessonComponent {
        LessonComponent {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            component_type: ComponentType::parse("slides"),
            title: "States of matter".into(),
            content: LessonComponentContent::Slides(SlidesContent {
                slides,
                require_full_viewing,
                file_url: None,
            }),
            order: 0,
            enabled,
            is_assignable: false,
            reading_level: None,
            language_code: None,
            read_aloud: false,
        }
    }

    fn runtime(
        component: LessonComponent,
        can_preview: bool,
    ) -> (PresentationRuntime, mpsc::UnboundedReceiver<PresentationOutput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = PresentationRuntime::new(
            can_preview,
            Arc::new(OneComponent(component)),
            Arc::new(Shouting),
            Arc::new(Beep),
            tx,
        );
        (runtime, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PresentationOutput>) -> Vec<PresentationOutput> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    fn completions(outputs: &[PresentationOutput]) -> usize {
        outputs
            .iter()
            .filter(|o| {
                matches!(
                    o,
                    PresentationOutput::Message(PresentationServerMessage::Completed { .. })
                )
            })
            .count()
    }

    #[tokio::test]
    async fn viewing_every_slide_completes_once() {
        let component = deck_component(true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);

        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "End".into() }).await;
        assert_eq!(completions(&drain(&mut rx)), 0);

        runtime.handle_message(PresentationClientMessage::Swipe { delta_x: 80.0 }).await;
        let outputs = drain(&mut rx);
        assert_eq!(completions(&outputs), 1);

        runtime.handle_message(PresentationClientMessage::GoTo { index: 0 }).await;
        runtime.handle_message(PresentationClientMessage::GoTo { index: 99 }).await;
        let outputs = drain(&mut rx);
        assert_eq!(completions(&outputs), 0);
        match outputs.last() {
            Some(PresentationOutput::Message(PresentationServerMessage::Navigated { state, slide })) => {
                assert_eq!(state.index, 2);
                assert_eq!(slide.as_ref().map(|s| s.title.as_str()), Some("Gases"));
            }
            other => panic!("expected navigation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn short_swipes_and_unknown_keys_are_ignored() {
        let component = deck_component(true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);
        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        drain(&mut rx);

        runtime.handle_message(PresentationClientMessage::Swipe { delta_x: -20.0 }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "q".into() }).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn translation_and_speech_use_the_current_slide() {
        let component = deck_component(true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);
        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "ArrowRight".into() }).await;
        drain(&mut rx);

        runtime
            .handle_message(PresentationClientMessage::Translate {
                target_language: "es".into(),
            })
            .await;
        runtime.handle_message(PresentationClientMessage::Speak).await;

        let outputs = drain(&mut rx);
        assert_eq!(
            outputs,
            vec![
                PresentationOutput::Message(PresentationServerMessage::Translation {
                    index: 1,
                    target_language: "es".into(),
                    text: "LIQUIDS. PARTICLES SLIDE PAST EACH OTHER".into(),
                }),
                PresentationOutput::Message(PresentationServerMessage::SpeechStarted { index: 1 }),
                PresentationOutput::Audio(b"Liquids. Particles slide past each other".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn disabled_components_open_only_for_preview() {
        let component = deck_component(false);
        let id = component.id;

        let (student_view, mut rx) = runtime(component.clone(), false);
        student_view.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [PresentationOutput::Message(PresentationServerMessage::Error { .. })]
        ));

        let (preview, mut rx) = runtime(component, true);
        preview.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [PresentationOutput::Message(PresentationServerMessage::Opened { .. })]
        ));
    }

    #[tokio::test]
    async fn navigation_before_open_is_an_error() {
        let (runtime, mut rx) = runtime(deck_component(true), false);
        runtime.handle_message(PresentationClientMessage::Key { key: "Home".into() }).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [PresentationOutput::Message(PresentationServerMessage::Error { .. })]
        ));
    }

    #[tokio::test]
    async fn single_slide_deck_completes_when_opened() {
        let component = slides_component(vec![slide("Energy", "Cannot be created")], true, true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);

        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        let outputs = drain(&mut rx);
        match outputs.first() {
            Some(PresentationOutput::Message(PresentationServerMessage::Opened { state, .. })) => {
                assert!(state.completed_now);
                assert_eq!(state.viewed_count, 1);
            }
            other => panic!("expected opened, got {:?}", other),
        }
        assert_eq!(
            outputs.last(),
            Some(&PresentationOutput::Message(PresentationServerMessage::Completed {
                component_id: id
            }))
        );
        assert_eq!(completions(&outputs), 1);

        runtime.handle_message(PresentationClientMessage::Key { key: "ArrowRight".into() }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "Home".into() }).await;
        assert_eq!(completions(&drain(&mut rx)), 0);
    }

    #[tokio::test]
    async fn decks_without_full_viewing_never_complete() {
        let slides = vec![slide("Force", "Push or pull"), slide("Mass", "Amount of matter")];
        let component = slides_component(slides, false, true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);

        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "End".into() }).await;
        runtime.handle_message(PresentationClientMessage::Key { key: "Home".into() }).await;
        let outputs = drain(&mut rx);
        assert_eq!(outputs.len(), 3);
        assert_eq!(completions(&outputs), 0);
    }

    #[tokio::test]
    async fn empty_deck_is_rejected_on_open() {
        let component = slides_component(Vec::new(), true, true);
        let id = component.id;
        let (runtime, mut rx) = runtime(component, false);

        runtime.handle_message(PresentationClientMessage::Open { component_id: id }).await;
        match drain(&mut rx).as_slice() {
            [PresentationOutput::Message(PresentationServerMessage::Error { message })] => {
                assert_eq!(message, &PresentationError::Empty.to_string());
            }
            other => panic!("expected an error, got {:?}", other),
        }

        runtime.handle_message(PresentationClientMessage::Key { key: "End".into() }).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [PresentationOutput::Message(PresentationServerMessage::Error { .. })]
        ));
    }
}
