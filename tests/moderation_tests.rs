use std::sync::Arc;
use whitelist_registry::{
    models::{ModerationAction, NewWhitelist, VerificationStage, Whitelist},
    repositories::{SqliteWhitelistRepository, WhitelistRepository},
    services::{ConfirmationService, ConfirmationServiceError, RegistrationService},
    test_utils::test_helpers,
};

async fn setup() -> (Arc<SqliteWhitelistRepository>, ConfirmationService, Whitelist, String) {
    setup_on(test_helpers::create_test_db().await.unwrap()).await
}

async fn setup_on(
    pool: sqlx::SqlitePool,
) -> (Arc<SqliteWhitelistRepository>, ConfirmationService, Whitelist, String) {
    let passport = test_helpers::insert_test_photo(&pool).await.unwrap();
    let repository = Arc::new(SqliteWhitelistRepository::new(pool));
    let registered = RegistrationService::new(repository.clone())
        .register(NewWhitelist {
            passport_id: passport,
            selfie_id: None,
            name: "Bob".to_string(),
            email: "bob@x.com".to_string(),
            phone: String::new(),
            birthday: "1985-06-15".to_string(),
            country: "Norway".to_string(),
        })
        .await
        .unwrap();
    let service = ConfirmationService::new(repository.clone());
    (repository, service, registered.whitelist, registered.token)
}

#[tokio::test]
async fn test_decline_and_question_move_freely_below_accepted() {
    let (_, service, whitelist, token) = setup().await;
    service.confirm_email(&token).await.unwrap();

    let declined = service.decline(whitelist.id).await.unwrap();
    assert_eq!(declined.verification_stage, VerificationStage::Declined);

    let questioned = service.question(whitelist.id).await.unwrap();
    assert_eq!(questioned.verification_stage, VerificationStage::Question);

    let declined = service.decline(whitelist.id).await.unwrap();
    assert_eq!(declined.verification_stage, VerificationStage::Declined);
}

#[tokio::test]
async fn test_accepted_is_final_for_decline_and_question() {
    let (repository, service, whitelist, _) = setup().await;

    service.accept(whitelist.id).await.unwrap();

    for action in [ModerationAction::Decline, ModerationAction::Question] {
        let result = service.moderate(whitelist.id, action).await;
        assert!(
            matches!(
                result,
                Err(ConfirmationServiceError::InvalidStageTransition {
                    current: VerificationStage::Accepted,
                    ..
                })
            ),
            "{} should be refused",
            action
        );
    }

    let stored = repository.find_by_id(whitelist.id).await.unwrap().unwrap();
    assert_eq!(stored.verification_stage, VerificationStage::Accepted);
}

#[tokio::test]
async fn test_accept_overrides_earlier_decisions() {
    let (_, service, whitelist, _) = setup().await;

    service.decline(whitelist.id).await.unwrap();
    let accepted = service.accept(whitelist.id).await.unwrap();
    assert_eq!(accepted.verification_stage, VerificationStage::Accepted);

    // Accepting twice is harmless
    let accepted = service.accept(whitelist.id).await.unwrap();
    assert_eq!(accepted.verification_stage, VerificationStage::Accepted);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let (_, service, whitelist, _) = setup().await;

    for action in [
        ModerationAction::Accept,
        ModerationAction::Decline,
        ModerationAction::Question,
    ] {
        let result = service.moderate(whitelist.id + 100, action).await;
        assert!(matches!(result, Err(ConfirmationServiceError::NotFound)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_decline_and_accept_end_consistent() {
    // Separate connections, so the two UPDATEs race inside SQLite
    let (pool, _db_file) = test_helpers::create_test_db_file(4).await.unwrap();
    let (repository, service, whitelist, _) = setup_on(pool).await;
    let service = Arc::new(service);

    let decline = tokio::spawn({
        let service = service.clone();
        async move { service.decline(whitelist.id).await }
    });
    let accept = tokio::spawn({
        let service = service.clone();
        async move { service.accept(whitelist.id).await }
    });
    let declined = decline.await.unwrap();
    let accepted = accept.await.unwrap();

    // Accept always lands; decline either ran first or lost to the guard
    assert!(accepted.is_ok());
    let stored = repository.find_by_id(whitelist.id).await.unwrap().unwrap();
    match declined {
        Ok(_) => assert_eq!(stored.verification_stage, VerificationStage::Accepted),
        Err(ConfirmationServiceError::InvalidStageTransition { current, .. }) => {
            assert_eq!(current, VerificationStage::Accepted);
            assert_eq!(stored.verification_stage, VerificationStage::Accepted);
        }
        Err(other) => panic!("unexpected error: {}", other),
    }
}
