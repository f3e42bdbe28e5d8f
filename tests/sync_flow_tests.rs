// Library level flows across the coordinator, the backends and the
// credential session.

use std::sync::Arc;

use dossier::credentials::Submitted;
use dossier::models::{MessageTemplate, SocialPostDraft};
use dossier::prompt::PromptState;
use dossier::{
    CipherParams, CredentialDraft, CredentialSession, DossierError, FileBackend, MemoryBackend,
    RecordBody, RecordPatch, ResourceKind, SecretCipher, SecretString, StaticIdentity,
    SyncCoordinator,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn light_cipher() -> SecretCipher {
    SecretCipher::with_params(CipherParams::new(1024, 1, 1))
}

fn template(title: &str) -> RecordBody {
    RecordBody::MessageTemplate(MessageTemplate {
        title: title.to_string(),
        content: "Hello {name}".to_string(),
        category: "sales".to_string(),
    })
}

fn draft(secret: &str) -> CredentialDraft {
    CredentialDraft {
        title: "Mail".to_string(),
        username: "alice@example.com".to_string(),
        secret: SecretString::new(secret),
        url: None,
        notes: Some("personal inbox".to_string()),
    }
}

#[tokio::test]
async fn test_file_backed_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");

    let id = {
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::new(FileBackend::new(&path)),
            Arc::new(StaticIdentity::new("alice")),
        ));
        let mut session = CredentialSession::new(coordinator, light_cipher());
        session.request_create(draft("hunter2")).unwrap();
        match session
            .submit(&SecretString::new("hunter3"))
            .await
            .unwrap()
        {
            Submitted::Created(record) => record.id,
            other => panic!("unexpected outcome: {other:?}"),
        }
    };

    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::new(FileBackend::new(&path)),
        Arc::new(StaticIdentity::new("alice")),
    ));
    coordinator.refresh(ResourceKind::Credential).await.unwrap();
    let mut session = CredentialSession::new(coordinator, light_cipher());

    session.request_reveal(&id).unwrap();
    let result = session.submit(&SecretString::new("hunter2")).await;
    assert!(matches!(result, Err(DossierError::DecryptionFailed)));
    assert!(session.revealed(&id).is_none());
    assert_eq!(session.prompt().state(), PromptState::Idle);

    session.request_reveal(&id).unwrap();
    session.submit(&SecretString::new("hunter3")).await.unwrap();
    assert_eq!(session.revealed(&id).unwrap().expose_secret(), "hunter2");
}

#[tokio::test]
async fn test_prompt_rejects_second_request() {
    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(StaticIdentity::new("alice")),
    ));
    let mut session = CredentialSession::new(coordinator, light_cipher());

    session.request_create(draft("first")).unwrap();
    let second = session.request_create(draft("second"));
    assert!(matches!(second, Err(DossierError::PromptBusy)));

    let created = match session.submit(&SecretString::new("pw")).await.unwrap() {
        Submitted::Created(record) => record,
        other => panic!("unexpected outcome: {other:?}"),
    };
    session.request_reveal(&created.id).unwrap();
    session.submit(&SecretString::new("pw")).await.unwrap();
    assert_eq!(
        session.revealed(&created.id).unwrap().expose_secret(),
        "first"
    );
}

#[tokio::test]
async fn test_kinds_do_not_interfere() {
    let backend = Arc::new(MemoryBackend::new());
    let coordinator = SyncCoordinator::new(backend.clone(), Arc::new(StaticIdentity::new("alice")));

    coordinator
        .create(ResourceKind::MessageTemplate, template("Intro"))
        .await
        .unwrap();
    coordinator
        .create(
            ResourceKind::SocialPostDraft,
            RecordBody::SocialPostDraft(SocialPostDraft {
                content: "Launch day".to_string(),
                category: "news".to_string(),
                image_url: None,
                tags: vec!["rust".to_string()],
            }),
        )
        .await
        .unwrap();

    backend.fail_next("gateway timeout");
    assert!(coordinator
        .refresh(ResourceKind::SocialPostDraft)
        .await
        .is_err());

    assert_eq!(coordinator.snapshot(ResourceKind::MessageTemplate).len(), 1);
    assert_eq!(coordinator.snapshot(ResourceKind::SocialPostDraft).len(), 1);
    for kind in ResourceKind::ALL {
        assert!(!coordinator.is_loading(kind));
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create(String),
    Update(usize, String),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Op::Create),
        (any::<usize>(), "[a-z]{1,8}").prop_map(|(i, t)| Op::Update(i, t)),
        any::<usize>().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_cache_equals_replay_of_successful_calls(ops in proptest::collection::vec(op(), 0..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let coordinator = SyncCoordinator::new(
                Arc::new(MemoryBackend::new()),
                Arc::new(StaticIdentity::new("alice")),
            );
            let kind = ResourceKind::MessageTemplate;
            // (id, title), newest first
            let mut model: Vec<(String, String)> = Vec::new();

            for op in ops {
                match op {
                    Op::Create(title) => {
                        let record = coordinator.create(kind, template(&title)).await.unwrap();
                        model.insert(0, (record.id, title));
                    }
                    Op::Update(i, title) if !model.is_empty() => {
                        let slot = i % model.len();
                        let patch = RecordPatch::from_assignments(kind, &[format!("title={title}")]).unwrap();
                        coordinator.update(kind, &model[slot].0, patch).await.unwrap();
                        model[slot].1 = title;
                    }
                    Op::Delete(i) if !model.is_empty() => {
                        let slot = i % model.len();
                        let (id, _) = model.remove(slot);
                        coordinator.remove(kind, &id).await.unwrap();
                    }
                    _ => {}
                }
            }

            let cached: Vec<(String, String)> = coordinator
                .snapshot(kind)
                .into_iter()
                .map(|r| (r.id.clone(), r.body.headline().to_string()))
                .collect();
            assert_eq!(cached, model);

            coordinator.refresh(kind).await.unwrap();
            let reloaded: Vec<String> = coordinator.snapshot(kind).into_iter().map(|r| r.id).collect();
            let expected: Vec<String> = model.iter().map(|(id, _)| id.clone()).collect();
            assert_eq!(reloaded, expected);
        });
    }
}
