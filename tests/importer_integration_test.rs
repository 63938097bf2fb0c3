// ==========================================
// BulkImporter 集成测试
// ==========================================
// 测试目标: 验证 CSV → 客户/保单/缴费/收据 的完整导入流程
// ==========================================


use async_trait::async_trait;
use policy_import::clock::Clock;
use policy_import::config::{config_keys, ConfigManager};
use policy_import::domain::{EntityKind, ImportEvent, Payment};
use policy_import::importer::{
    event_channel, BulkImporter, BulkImporterImpl, CollectingSink, ImportError,
    ImportRepositories,
};
use policy_import::logging;
use policy_import::repository::{PaymentRepository, RepositoryError, RepositoryResult};
use std::sync::Arc;
use test_helpers::*;

/// 缴费写入总是失败（磁盘满）
struct FailingPaymentRepository;

#[async_trait]
impl PaymentRepository for FailingPaymentRepository {
    async fn find_by_id(&self, _id: &str) -> RepositoryResult<Option<Payment>> {
        Ok(None)
    }

    async fn find_by_receipt_number(
        &self,
        _receipt_number: &str,
    ) -> RepositoryResult<Option<Payment>> {
        Ok(None)
    }

    async fn receipt_number_exists(&self, _receipt_number: &str) -> RepositoryResult<bool> {
        Ok(false)
    }

    async fn insert(&self, _payment: &Payment) -> RepositoryResult<()> {
        Err(RepositoryError::DatabaseQueryError("disk full".to_string()))
    }
}

async fn seed_customers_and_policy(db_path: &str) {
    let importer = create_test_importer(db_path);
    let customers = importer
        .import_csv(EntityKind::Customers, SEED_CUSTOMERS_CSV, &customer_mappings())
        .await
        .unwrap();
    assert_eq!(customers.imported, 2);

    let policies = importer
        .import_csv(EntityKind::Policies, SEED_POLICIES_CSV, &policy_mappings())
        .await
        .unwrap();
    assert_eq!(policies.imported, 1);
}

#[tokio::test]
async fn test_duplicate_customer_id_number_is_suffixed() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let csv = "First Name,Last Name,ID Number\nJane,Doe,ID-1\nJohn,Roe,ID-1\n";
    let summary = importer
        .import_csv(EntityKind::Customers, csv, &customer_mappings())
        .await
        .unwrap();

    assert_eq!(summary.imported, 2);
    assert!(summary.errors.is_empty());

    let id_numbers = column_values(&db_path, "customers", "id_number");
    assert_eq!(
        id_numbers,
        vec![
            Some("ID-1".to_string()),
            Some(format!("ID-1-{}-1", fixed_timestamp_millis())),
        ]
    );
}

#[tokio::test]
async fn test_customer_defaults_and_month_first_dates() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let csv = "First,Id,DOB\n,007,7/10/2018\n";
    let summary = importer
        .import_csv(
            EntityKind::Customers,
            csv,
            &mappings(&[("firstName", "First"), ("idNumber", "Id"), ("dateOfBirth", "DOB")]),
        )
        .await
        .unwrap();
    assert_eq!(summary.imported, 1);

    assert_eq!(
        column_values(&db_path, "customers", "first_name"),
        vec![Some("Unknown".to_string())]
    );
    assert_eq!(
        column_values(&db_path, "customers", "last_name"),
        vec![Some("Unknown".to_string())]
    );
    assert_eq!(column_values(&db_path, "customers", "id_number"), vec![Some("007".to_string())]);
    assert_eq!(
        column_values(&db_path, "customers", "date_of_birth"),
        vec![Some("2018-07-10".to_string())]
    );
}

#[tokio::test]
async fn test_policy_negative_outstanding_clamped_to_zero() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);
    importer
        .import_csv(EntityKind::Customers, SEED_CUSTOMERS_CSV, &customer_mappings())
        .await
        .unwrap();

    let csv = "Policy No,Customer,Premium,Outstanding\nP-9,jane@example.com,500,-50\n";
    let summary = importer
        .import_csv(
            EntityKind::Policies,
            csv,
            &mappings(&[
                ("policyNumber", "Policy No"),
                ("customerId", "Customer"),
                ("totalPremiumDue", "Premium"),
                ("outstandingBalance", "Outstanding"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(summary.imported, 1);
    assert_eq!(policy_balance(&db_path, "P-9"), (500.0, 0.0, 0.0));
}

#[tokio::test]
async fn test_policy_with_unknown_customer_is_row_error() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let csv = "Policy No,Customer,Premium\nP-1,ghost@example.com,100\n";
    let summary = importer
        .import_csv(EntityKind::Policies, csv, &policy_mappings())
        .await
        .unwrap();

    assert_eq!(summary.imported, 0);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("Row 2: Customer not found: \"ghost@example.com\""));
    assert!(summary.errors[0].contains("P-1, ghost@example.com, 100"));
    assert_eq!(count_rows(&db_path, "policies"), 0);
}

#[tokio::test]
async fn test_payment_updates_policy_balance() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_customers_and_policy(&db_path).await;
    let importer = create_test_importer(&db_path);

    let csv = "Policy,Amount,Receipt\nNBI-001,200,R-100\n";
    let summary = importer
        .import_csv(
            EntityKind::Payments,
            csv,
            &mappings(&[
                ("policyId", "Policy"),
                ("amount", "Amount"),
                ("receiptNumber", "Receipt"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(summary.imported, 1);
    assert_eq!(policy_balance(&db_path, "NBI-001"), (500.0, 200.0, 300.0));
    assert_eq!(policy_updated_at(&db_path, "NBI-001"), fixed_clock().now());
    assert_eq!(
        column_values(&db_path, "payments", "payment_method"),
        vec![Some("Cash".to_string())]
    );
    assert_eq!(
        column_values(&db_path, "payments", "payment_date"),
        vec![Some("2024-06-01".to_string())]
    );
}

#[tokio::test]
async fn test_payment_insert_failure_keeps_applied_balance() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_customers_and_policy(&db_path).await;

    let conn = open_test_connection(&db_path).unwrap();
    let mut repos = ImportRepositories::sqlite(conn.clone()).unwrap();
    repos.payments = Arc::new(FailingPaymentRepository);
    let importer =
        BulkImporterImpl::new(repos, ConfigManager::from_connection(conn), fixed_clock());

    let csv = "Policy,Amount,Receipt\nNBI-001,200,R-100\n";
    let summary = importer
        .import_csv(
            EntityKind::Payments,
            csv,
            &mappings(&[
                ("policyId", "Policy"),
                ("amount", "Amount"),
                ("receiptNumber", "Receipt"),
            ]),
        )
        .await
        .unwrap();

    let policy_id = column_values(&db_path, "policies", "id")[0].clone().unwrap();
    assert_eq!(summary.imported, 0);
    assert_eq!(
        summary.errors,
        vec![format!(
            "Row 2: Database write failed: disk full (policy {} balance was already updated)",
            policy_id
        )]
    );

    // 保单聚合不回滚，缴费未落库
    assert_eq!(policy_balance(&db_path, "NBI-001"), (500.0, 200.0, 300.0));
    assert_eq!(count_rows(&db_path, "payments"), 0);
}

#[tokio::test]
async fn test_payments_accumulate_within_one_run() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_customers_and_policy(&db_path).await;
    let importer = create_test_importer(&db_path);

    // 第二行收据号重复，第三行收据号为空（存 NULL）
    let csv = "Policy,Amount,Refund,Receipt\n\
NBI-001,200,,R-1\n\
NBI-001,250,,R-1\n\
NBI-001,0,100,\n";
    let summary = importer
        .import_csv(
            EntityKind::Payments,
            csv,
            &mappings(&[
                ("policyId", "Policy"),
                ("amount", "Amount"),
                ("refundAmount", "Refund"),
                ("receiptNumber", "Receipt"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(summary.imported, 3);
    assert_eq!(policy_balance(&db_path, "NBI-001"), (500.0, 550.0, 0.0));
    assert_eq!(
        column_values(&db_path, "payments", "receipt_number"),
        vec![
            Some("R-1".to_string()),
            Some(format!("R-1-{}-1", fixed_timestamp_millis())),
            None,
        ]
    );
}

#[tokio::test]
async fn test_payment_blank_policy_emits_single_row_error() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_customers_and_policy(&db_path).await;
    let importer = create_test_importer(&db_path);

    let csv = "Policy,Amount\n,100\n";
    let mut sink = CollectingSink::default();
    let summary = importer
        .import_csv_streaming(
            EntityKind::Payments,
            csv,
            &mappings(&[("policyId", "Policy"), ("amount", "Amount")]),
            &mut sink,
        )
        .await
        .unwrap();

    let error_events: Vec<&ImportEvent> = sink
        .events
        .iter()
        .filter(|e| matches!(e, ImportEvent::Error { .. }))
        .collect();
    assert_eq!(error_events.len(), 1);
    assert!(matches!(error_events[0], ImportEvent::Error { row: Some(2), .. }));

    assert_eq!(summary.imported, 0);
    assert_eq!(count_rows(&db_path, "payments"), 0);
    assert_eq!(policy_balance(&db_path, "NBI-001"), (500.0, 0.0, 500.0));
}

#[tokio::test]
async fn test_streaming_and_sync_runs_agree() {
    let csv = "Policy,Amount\nNBI-001,50\nNOPE-1,10\n,5\nNBI-001,25\n";
    let payment_mappings = mappings(&[("policyId", "Policy"), ("amount", "Amount")]);

    let (_sync_file, sync_db) = create_test_db().unwrap();
    seed_customers_and_policy(&sync_db).await;
    let sync_summary = create_test_importer(&sync_db)
        .import_csv(EntityKind::Payments, csv, &payment_mappings)
        .await
        .unwrap();

    let (_stream_file, stream_db) = create_test_db().unwrap();
    seed_customers_and_policy(&stream_db).await;
    let mut sink = CollectingSink::default();
    let stream_summary = create_test_importer(&stream_db)
        .import_csv_streaming(EntityKind::Payments, csv, &payment_mappings, &mut sink)
        .await
        .unwrap();

    assert_eq!(sync_summary.imported, 2);
    assert_eq!(sync_summary.imported, stream_summary.imported);
    assert_eq!(sync_summary.errors, stream_summary.errors);

    // 每行一个 progress，错误事件先于该行 progress，最后一个 complete
    let progress_count = sink
        .events
        .iter()
        .filter(|e| matches!(e, ImportEvent::Progress { .. }))
        .count();
    assert_eq!(progress_count, 4);
    assert!(matches!(sink.events[0], ImportEvent::Progress { current: 1, .. }));
    assert!(matches!(sink.events[1], ImportEvent::Error { row: Some(3), .. }));
    assert!(matches!(
        sink.events[2],
        ImportEvent::Progress { current: 2, imported: 1, errors: 1, .. }
    ));
    match sink.events.last() {
        Some(ImportEvent::Complete { imported, errors, total }) => {
            assert_eq!(*imported, 2);
            assert_eq!(*total, 4);
            assert_eq!(errors, &stream_summary.errors);
        }
        other => panic!("expected complete event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_receipts_location_inheritance_and_suffix() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_customers_and_policy(&db_path).await;
    insert_test_config(
        &db_path,
        config_keys::RECEIPT_LOCATION_PREFIXES,
        r#"{"nbi": "Nairobi"}"#,
    )
    .unwrap();
    let importer = create_test_importer(&db_path);

    let csv = "Policy,Receipt,Customer\nNBI-001,R-7,\nNBI-001,R-7,ID-2\nNBI-001,,\n";
    let summary = importer
        .import_csv(
            EntityKind::Receipts,
            csv,
            &mappings(&[
                ("policyId", "Policy"),
                ("receiptNumber", "Receipt"),
                ("customerId", "Customer"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(summary.imported, 3);
    let ts = fixed_timestamp_millis();
    assert_eq!(
        column_values(&db_path, "receipts", "receipt_number"),
        vec![
            Some("R-7".to_string()),
            Some(format!("R-7-{}-1", ts)),
            Some(format!("RCT-{}-2", ts)),
        ]
    );
    assert_eq!(
        column_values(&db_path, "receipts", "location"),
        vec![Some("Nairobi".to_string()); 3]
    );
    assert_eq!(
        column_values(&db_path, "receipts", "status"),
        vec![Some("Issued".to_string()); 3]
    );

    let customers = column_values(&db_path, "receipts", "customer_id");
    let customer_ids = column_values(&db_path, "customers", "id");
    // 未指定客户 → 继承保单主客户（ID-1）；显式指定 → ID-2
    assert_eq!(customers[0], customer_ids[0]);
    assert_eq!(customers[1], customer_ids[1]);
    assert_eq!(customers[2], customer_ids[0]);
}

#[tokio::test]
async fn test_legacy_policy_number_unique_index_is_dropped() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "CREATE UNIQUE INDEX idx_policies_policy_number_unique ON policies(policy_number)",
            [],
        )
        .unwrap();
    }
    let importer = create_test_importer(&db_path);
    importer
        .import_csv(EntityKind::Customers, SEED_CUSTOMERS_CSV, &customer_mappings())
        .await
        .unwrap();

    let csv = "Policy No,Customer,Premium\nDUP-1,ID-1,100\nDUP-1,ID-2,200\n";
    let summary = importer
        .import_csv(EntityKind::Policies, csv, &policy_mappings())
        .await
        .unwrap();

    assert_eq!(summary.imported, 2);
    assert_eq!(
        column_values(&db_path, "policies", "policy_number"),
        vec![Some("DUP-1".to_string()), Some("DUP-1".to_string())]
    );
}

#[tokio::test]
async fn test_policy_number_guard_when_enabled() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    insert_test_config(&db_path, config_keys::ENFORCE_POLICY_NUMBER_UNIQUE, "true").unwrap();
    let importer = create_test_importer(&db_path);
    importer
        .import_csv(EntityKind::Customers, SEED_CUSTOMERS_CSV, &customer_mappings())
        .await
        .unwrap();

    let csv = "Policy No,Customer,Premium\nDUP-1,ID-1,100\nDUP-1,ID-2,200\n";
    let summary = importer
        .import_csv(EntityKind::Policies, csv, &policy_mappings())
        .await
        .unwrap();

    assert_eq!(summary.imported, 2);
    assert_eq!(
        column_values(&db_path, "policies", "policy_number"),
        vec![
            Some("DUP-1".to_string()),
            Some(format!("DUP-1-{}-1", fixed_timestamp_millis())),
        ]
    );
}

#[tokio::test]
async fn test_fatal_inputs_abort_before_rows() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let empty = importer
        .import_csv(EntityKind::Customers, "\n  \n", &customer_mappings())
        .await;
    assert!(matches!(empty, Err(ImportError::EmptyInput)));

    let unmapped = importer
        .import_csv(EntityKind::Customers, SEED_CUSTOMERS_CSV, &mappings(&[]))
        .await;
    assert!(matches!(unmapped, Err(ImportError::MissingMappings)));

    assert_eq!(count_rows(&db_path, "customers"), 0);
}

#[tokio::test]
async fn test_closed_event_consumer_aborts_run() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let (mut sink, events) = event_channel(1);
    drop(events);

    let result = importer
        .import_csv_streaming(
            EntityKind::Customers,
            SEED_CUSTOMERS_CSV,
            &customer_mappings(),
            &mut sink,
        )
        .await;

    assert!(matches!(result, Err(ImportError::SinkClosed(_))));
    // 第一行落库后投递进度失败，第二行不再处理
    assert_eq!(count_rows(&db_path, "customers"), 1);
}
