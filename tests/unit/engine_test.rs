mod support;

use sqlbot::batch::StatementBatch;
use sqlbot::engine::{
    ExecutionResult, FAILURE_PREFIX, ROUTINE_CREATED_MESSAGE, SUCCESS_MESSAGE, execute, failure_text,
};
use support::{FakeDatabase, FakeTable, profile, text, usuarios};

fn db() -> FakeDatabase {
    FakeDatabase::new(vec![
        usuarios(),
        FakeTable::new("pedidos", &[("id", "integer"), ("total", "numeric")])
            .with_rows(vec![vec![text("10"), text("99.50")]]),
    ])
}

#[tokio::test]
async fn test_single_select_returns_every_row() {
    let db = db();
    let batch = StatementBatch::parse("SELECT * FROM usuarios;");

    let result = execute(&db, &profile(), &batch).await.unwrap();

    match result {
        ExecutionResult::Rows { columns, data } => {
            assert_eq!(columns, vec!["id", "nombre", "email", "edad"]);
            assert_eq!(data.len(), 3);
            assert_eq!(data[0][1], text("prueba 1"));
        }
        other => panic!("expected rows, got {other:?}"),
    }
    let state = db.state();
    assert_eq!(state.begins, 1);
    assert_eq!(state.commits, 1);
    assert_eq!(state.rollbacks, 0);
}

#[tokio::test]
async fn test_write_only_batch_is_acknowledged() {
    let db = db();
    let batch = StatementBatch::parse(
        "INSERT INTO usuarios (nombre, email, edad) VALUES ('x', 'x@example.com', 20);\
         UPDATE usuarios SET edad = 21 WHERE nombre = 'x';",
    );

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert_eq!(
        result,
        ExecutionResult::Ack {
            message: SUCCESS_MESSAGE.to_string()
        }
    );
    assert_eq!(db.state().committed.len(), 2);
}

#[tokio::test]
async fn test_routine_definition_is_acknowledged() {
    let db = db();
    let batch = StatementBatch::parse(
        "CREATE OR REPLACE FUNCTION contar_usuarios() RETURNS bigint AS $$\n\
         BEGIN RETURN (SELECT count(*) FROM usuarios); END;\n\
         $$ LANGUAGE plpgsql;",
    );
    assert_eq!(batch.len(), 1);

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert_eq!(
        result,
        ExecutionResult::Ack {
            message: ROUTINE_CREATED_MESSAGE.to_string()
        }
    );
    assert_eq!(db.state().commits, 1);
}

#[tokio::test]
async fn test_failing_statement_rolls_back_whole_batch() {
    let db = db();
    db.fail_on("bogus");
    let batch = StatementBatch::parse(
        "INSERT INTO pedidos (id, total) VALUES (11, 5);\
         SELECT bogus FROM pedidos;\
         DELETE FROM pedidos;",
    );

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert_eq!(
        result,
        ExecutionResult::Failure {
            message: "syntax error at or near \"bogus\"".to_string()
        }
    );
    let state = db.state();
    assert!(state.committed.is_empty(), "nothing may persist: {:?}", state.committed);
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.commits, 0);
    // Execution stops at the failing statement.
    assert_eq!(state.executed.len(), 2);
    assert_eq!(state.closes, 1);
}

#[tokio::test]
async fn test_failed_commit_is_a_failure() {
    let db = db();
    db.fail_commit();
    let batch = StatementBatch::parse("UPDATE pedidos SET total = 0;");

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert!(result.is_failure());
    assert!(result.to_string().starts_with(FAILURE_PREFIX));
    assert_eq!(
        result.to_string(),
        failure_text("could not serialize access due to concurrent update")
    );
    let state = db.state();
    assert!(state.committed.is_empty());
    assert_eq!(state.rollbacks, 1);
}

#[tokio::test]
async fn test_mixed_batch_keeps_last_read() {
    let db = db();
    let batch = StatementBatch::parse(
        "SELECT * FROM usuarios; INSERT INTO pedidos (id, total) VALUES (12, 1); SELECT * FROM pedidos;",
    );

    let result = execute(&db, &profile(), &batch).await.unwrap();

    match result {
        ExecutionResult::Rows { columns, data } => {
            assert_eq!(columns, vec!["id", "total"]);
            assert_eq!(data, vec![vec![text("10"), text("99.50")]]);
        }
        other => panic!("expected rows, got {other:?}"),
    }
    assert_eq!(db.state().committed.len(), 3);
}

#[tokio::test]
async fn test_unreachable_database_is_an_error() {
    let db = db();
    db.unreachable();
    let batch = StatementBatch::parse("SELECT 1;");
    let err = execute(&db, &profile(), &batch).await.unwrap_err();
    assert!(err.to_string().starts_with("connection: "));
}

#[test]
fn test_result_kinds() {
    let rows = ExecutionResult::Rows {
        columns: vec!["a".to_string()],
        data: vec![],
    };
    assert_eq!(rows.kind(), "rows");
    assert_eq!(rows.to_string(), "0 row(s)");

    let ack = ExecutionResult::Ack {
        message: SUCCESS_MESSAGE.to_string(),
    };
    assert_eq!(ack.kind(), "ack");
    assert!(!ack.is_failure());
}

#[tokio::test]
async fn test_comment_led_select_returns_rows() {
    let db = db();
    let batch = StatementBatch::parse("-- all users\nSELECT * FROM usuarios;");

    let result = execute(&db, &profile(), &batch).await.unwrap();

    match result {
        ExecutionResult::Rows { data, .. } => assert_eq!(data.len(), 3),
        other => panic!("expected rows, got {other:?}"),
    }
}

#[tokio::test]
async fn test_embedded_commit_cannot_persist_part_of_a_batch() {
    let db = db();
    db.fail_on("bogus");
    let batch = StatementBatch::parse(
        "INSERT INTO pedidos (id, total) VALUES (13, 1);\
         COMMIT;\
         INSERT INTO pedidos (id, total) VALUES (bogus, 2);",
    );

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert!(result.is_failure());
    let state = db.state();
    assert!(state.committed.is_empty(), "nothing may persist: {:?}", state.committed);
    assert!(state.executed.iter().all(|sql| sql != "COMMIT;"));
    assert_eq!(state.rollbacks, 1);
}

#[tokio::test]
async fn test_wrapping_begin_and_commit_are_skipped() {
    let db = db();
    let batch = StatementBatch::parse(
        "BEGIN; UPDATE pedidos SET total = 0; START TRANSACTION; END; COMMIT;",
    );

    let result = execute(&db, &profile(), &batch).await.unwrap();

    assert_eq!(
        result,
        ExecutionResult::Ack {
            message: SUCCESS_MESSAGE.to_string()
        }
    );
    let state = db.state();
    assert_eq!(state.executed, vec!["UPDATE pedidos SET total = 0;"]);
    assert_eq!(state.committed, vec!["UPDATE pedidos SET total = 0;"]);
    assert_eq!(state.commits, 1);
}

#[tokio::test]
async fn test_batch_with_rollback_is_refused_before_running() {
    let db = db();
    let batch = StatementBatch::parse("DELETE FROM pedidos; ROLLBACK;");

    let result = execute(&db, &profile(), &batch).await.unwrap();

    match result {
        ExecutionResult::Failure { message } => assert!(message.contains("ROLLBACK"), "{message}"),
        other => panic!("expected failure, got {other:?}"),
    }
    let state = db.state();
    assert!(state.executed.is_empty());
    assert_eq!(state.begins, 0);
    assert_eq!(state.closes, 1);
}
