mod common;

use anyhow::Result;
use clarity::application::AppError;
use clarity::domain::{NewTransaction, TransactionKind, ValidationError};
use clarity::storage::TransactionFilter;
use common::{admin_session, expense, income, parse_date, test_service, user_session};

#[tokio::test]
async fn test_record_resolves_category_name() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let food = service
        .create_category(&ctx, "Food", None, TransactionKind::Expense)
        .await?;
    let tx = expense(&service, &ctx, 50000, "food", "2024-03-02").await?;

    assert_eq!(tx.category_id(), food.id.to_string());
    assert_eq!(tx.user_id(), ctx.user_id());

    let listed = service
        .list_transactions(&ctx, &TransactionFilter::default())
        .await?;
    assert_eq!(listed, vec![tx]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_category_is_kept_as_text() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let tx = expense(&service, &ctx, 12000, "Parking", "2024-03-02").await?;
    assert_eq!(tx.category_id(), "Parking");
    Ok(())
}

#[tokio::test]
async fn test_edit_replaces_with_same_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let original = expense(&service, &ctx, 50000, "Food", "2024-03-02").await?;
    let edited = service
        .edit_transaction(
            &ctx,
            original.id(),
            NewTransaction {
                amount: 45000,
                kind: TransactionKind::Expense,
                category_id: "Food".into(),
                date: parse_date("2024-03-03"),
                description: "Lunch".into(),
            },
        )
        .await?;

    assert_eq!(edited.id(), original.id());
    assert_eq!(edited.amount(), 45000);

    let listed = service
        .list_transactions(&ctx, &TransactionFilter::default())
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description(), "Lunch");
    assert_eq!(listed[0].date(), parse_date("2024-03-03"));
    Ok(())
}

#[tokio::test]
async fn test_delete_transaction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let tx = expense(&service, &ctx, 50000, "Food", "2024-03-02").await?;
    service.delete_transaction(&ctx, tx.id()).await?;

    let listed = service
        .list_transactions(&ctx, &TransactionFilter::default())
        .await?;
    assert!(listed.is_empty());

    let again = service.delete_transaction(&ctx, tx.id()).await;
    assert!(matches!(again, Err(AppError::TransactionNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_negative_amount_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let result = expense(&service, &ctx, -5, "Food", "2024-03-02").await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Validation(ValidationError::NegativeAmount { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_filters() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let food = service
        .create_category(&ctx, "Food", None, TransactionKind::Expense)
        .await?;
    expense(&service, &ctx, 10000, "Food", "2024-01-15").await?;
    expense(&service, &ctx, 20000, "Transport", "2024-02-01").await?;
    income(&service, &ctx, 500000, "Salary", "2024-02-25").await?;
    expense(&service, &ctx, 30000, "Food", "2024-03-10").await?;

    let expenses = service
        .list_transactions(
            &ctx,
            &TransactionFilter {
                kind: Some(TransactionKind::Expense),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(expenses.len(), 3);

    let food_only = service
        .list_transactions(
            &ctx,
            &TransactionFilter {
                category_keys: vec![food.id.to_string()],
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(food_only.len(), 2);

    let february = service
        .list_transactions(
            &ctx,
            &TransactionFilter {
                from_date: Some(parse_date("2024-02-01")),
                to_date: Some(parse_date("2024-02-29")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(february.len(), 2);

    let limited = service
        .list_transactions(
            &ctx,
            &TransactionFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].date(), parse_date("2024-01-15"));
    Ok(())
}

#[tokio::test]
async fn test_transactions_are_scoped_to_session_user() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let admin = admin_session(&service).await?;
    let other = user_session(&service, &admin, "budi@example.com").await?;

    let tx = expense(&service, &admin, 50000, "Food", "2024-03-02").await?;
    expense(&service, &other, 7000, "Food", "2024-03-02").await?;

    let mine = service
        .list_transactions(&other, &TransactionFilter::default())
        .await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].amount(), 7000);

    // Another user's transaction cannot be deleted.
    let result = service.delete_transaction(&other, tx.id()).await;
    assert!(matches!(result, Err(AppError::TransactionNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_category_lookup() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    let food = service
        .create_category(&ctx, "Food", None, TransactionKind::Expense)
        .await?;
    assert_eq!(service.find_category(&ctx, "FOOD").await?.id, food.id);
    assert_eq!(
        service.category_keys(&ctx, "food").await?,
        vec![food.id.to_string(), "Food".to_string()]
    );

    // Categories that only exist on imported records are matched by text.
    assert_eq!(service.category_keys(&ctx, "Parking").await?, vec!["Parking"]);
    let missing = service.find_category(&ctx, "Parking").await;
    assert!(matches!(missing, Err(AppError::CategoryNotFound(_))));

    let duplicate = service
        .create_category(&ctx, "food", None, TransactionKind::Expense)
        .await;
    assert!(matches!(duplicate, Err(AppError::CategoryAlreadyExists(_))));
    Ok(())
}

#[tokio::test]
async fn test_category_filter_includes_rows_recorded_before_category() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ctx = admin_session(&service).await?;

    // Recorded while "Food" was only free text.
    expense(&service, &ctx, 10000, "food", "2024-01-10").await?;
    let food = service
        .create_category(&ctx, "Food", None, TransactionKind::Expense)
        .await?;
    let keyed = expense(&service, &ctx, 20000, "Food", "2024-01-11").await?;
    assert_eq!(keyed.category_id(), food.id.to_string());
    expense(&service, &ctx, 30000, "Transport", "2024-01-12").await?;

    let filter = TransactionFilter {
        category_keys: service.category_keys(&ctx, "FOOD").await?,
        ..Default::default()
    };
    let rows = service.list_transactions(&ctx, &filter).await?;
    let amounts: Vec<i64> = rows.iter().map(|t| t.amount()).collect();
    assert_eq!(amounts, vec![10000, 20000]);
    Ok(())
}
