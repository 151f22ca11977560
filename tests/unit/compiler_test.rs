mod support;

use std::collections::BTreeMap;

use serde_json::json;
use sqlbot::batch::StatementBatch;
use sqlbot::compiler::{
    CompileOptions, CompileRequest, Compiled, NOT_A_DATABASE_QUESTION, apply_row_cap,
    clean_reply, compile, postprocess,
};
use sqlbot::intent::{IntentAction, StructuredIntent};
use support::ScriptedCompletion;

const OPTIONS: CompileOptions = CompileOptions { row_cap: 25 };

fn list_intent(table: &str) -> StructuredIntent {
    StructuredIntent {
        action: IntentAction::List,
        table: Some(table.to_string()),
        filters: BTreeMap::new(),
        limit: None,
    }
}

fn batch(compiled: Compiled) -> StatementBatch {
    match compiled {
        Compiled::Batch(batch) => batch,
        Compiled::Rejected(message) => panic!("unexpected rejection: {message}"),
    }
}

#[test]
fn test_clean_reply_strips_fence_and_label() {
    let reply = "Sure! Here it is:\n```sql\nSELECT * FROM usuarios;\n```\nHope that helps.";
    assert_eq!(clean_reply(reply), "SELECT * FROM usuarios;");
    assert_eq!(clean_reply("SQL: SELECT 1"), "SELECT 1");
    assert_eq!(clean_reply("Respuesta: Consulta: SELECT 1;"), "SELECT 1;");
}

#[test]
fn test_postprocess_splits_statements() {
    let compiled = postprocess("INSERT INTO t VALUES (1); SELECT * FROM t");
    let batch = batch(compiled);
    assert_eq!(
        batch.statements(),
        &["INSERT INTO t VALUES (1);", "SELECT * FROM t;"]
    );
}

#[test]
fn test_postprocess_rejects_prose() {
    let compiled = postprocess("I am a PostgreSQL bot and only answer questions about the database.");
    match compiled {
        Compiled::Rejected(message) => assert_eq!(message.as_str(), NOT_A_DATABASE_QUESTION),
        Compiled::Batch(batch) => panic!("prose accepted as SQL: {batch:?}"),
    }
}

#[test]
fn test_postprocess_rejects_empty_reply() {
    assert!(matches!(postprocess("   "), Compiled::Rejected(_)));
    assert!(matches!(postprocess("```sql\n```"), Compiled::Rejected(_)));
}

#[test]
fn test_row_cap_added_to_uncapped_select() {
    let mut batch = StatementBatch::parse("SELECT * FROM usuarios;");
    apply_row_cap(&mut batch, 25);
    assert_eq!(batch.statements(), &["SELECT * FROM usuarios\nLIMIT 25;"]);
}

#[test]
fn test_row_cap_respects_existing_limit() {
    let mut batch = StatementBatch::parse("SELECT * FROM usuarios LIMIT 5;");
    apply_row_cap(&mut batch, 25);
    assert_eq!(batch.statements(), &["SELECT * FROM usuarios LIMIT 5;"]);

    let mut batch = StatementBatch::parse("SELECT * FROM usuarios FETCH FIRST 3 ROWS ONLY;");
    apply_row_cap(&mut batch, 25);
    assert_eq!(batch.len(), 1);
    assert!(!batch.statements()[0].contains("LIMIT 25"));
}

#[test]
fn test_row_cap_respects_any_limit_form() {
    for sql in [
        "SELECT 1 AS one LIMIT ALL;",
        "SELECT * FROM usuarios LIMIT $1;",
        "SELECT * FROM usuarios LIMIT (SELECT count(*) FROM pedidos);",
        "SELECT * FROM usuarios\nlimit\n10 OFFSET 5;",
    ] {
        let mut batch = StatementBatch::parse(sql);
        apply_row_cap(&mut batch, 25);
        assert_eq!(batch.statements(), &[sql], "cap added to {sql}");
    }
}

#[test]
fn test_row_cap_added_after_leading_comment() {
    let mut batch = StatementBatch::parse("-- adults\nSELECT * FROM usuarios WHERE edad >= 18;");
    apply_row_cap(&mut batch, 25);
    assert_eq!(
        batch.statements(),
        &["-- adults\nSELECT * FROM usuarios WHERE edad >= 18\nLIMIT 25;"]
    );
}

#[test]
fn test_postprocess_accepts_comment_led_reply() {
    let reply = "```sql\n-- users older than 30\nSELECT * FROM usuarios WHERE edad > 30;\n```";
    let fenced = batch(postprocess(reply));
    assert_eq!(
        fenced.statements(),
        &["-- users older than 30\nSELECT * FROM usuarios WHERE edad > 30;"]
    );

    let block = batch(postprocess("/* count */ SELECT count(*) FROM usuarios"));
    assert_eq!(block.len(), 1);
}

#[test]
fn test_row_cap_skips_writes_and_multi_statement_batches() {
    let mut write = StatementBatch::parse("DELETE FROM usuarios WHERE id = 1;");
    apply_row_cap(&mut write, 25);
    assert_eq!(write.statements(), &["DELETE FROM usuarios WHERE id = 1;"]);

    let mut multi = StatementBatch::parse("SELECT 1; SELECT 2;");
    apply_row_cap(&mut multi, 25);
    assert_eq!(multi.statements(), &["SELECT 1;", "SELECT 2;"]);
}

#[tokio::test]
async fn test_compile_intent_without_table_skips_service() {
    let service = ScriptedCompletion::new(&["SELECT 1;"]);
    let intent = StructuredIntent::unknown();

    let compiled = compile(&service, CompileRequest::Intent(&intent), "", OPTIONS)
        .await
        .unwrap();

    assert!(matches!(compiled, Compiled::Rejected(_)));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_compile_intent_applies_default_row_cap() {
    let service = ScriptedCompletion::new(&["```sql\nSELECT * FROM usuarios WHERE edad > 30\n```"]);
    let mut intent = list_intent("usuarios");
    intent.filters.insert("edad".to_string(), json!(">30"));

    let compiled = compile(&service, CompileRequest::Intent(&intent), "schema", OPTIONS)
        .await
        .unwrap();

    let batch = batch(compiled);
    assert_eq!(batch.len(), 1);
    assert_eq!(
        batch.statements()[0],
        "SELECT * FROM usuarios WHERE edad > 30\nLIMIT 25;"
    );

    let prompts = service.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("- Table: usuarios"));
    assert!(prompt.contains(r#"{"edad":">30"}"#));
    assert!(prompt.contains("Limit results to 25 rows"));
}

#[tokio::test]
async fn test_compile_intent_limit_overrides_row_cap() {
    let service = ScriptedCompletion::new(&["SELECT nombre FROM usuarios"]);
    let mut intent = list_intent("usuarios");
    intent.limit = Some(3);

    let compiled = compile(&service, CompileRequest::Intent(&intent), "schema", OPTIONS)
        .await
        .unwrap();

    assert_eq!(
        batch(compiled).statements(),
        &["SELECT nombre FROM usuarios\nLIMIT 3;"]
    );
    assert!(service.prompts()[0].contains("Return at most 3 rows."));
}

#[tokio::test]
async fn test_compile_question_keeps_statements_as_written() {
    let service = ScriptedCompletion::new(&[
        "CREATE TABLE notas (id SERIAL PRIMARY KEY, texto TEXT);\nINSERT INTO notas (texto) VALUES ('hola');",
    ]);

    let compiled = compile(
        &service,
        CompileRequest::Question("Create a notes table with one note"),
        "schema",
        OPTIONS,
    )
    .await
    .unwrap();

    let batch = batch(compiled);
    assert_eq!(batch.len(), 2);
    assert!(batch.statements()[0].starts_with("CREATE TABLE notas"));
    assert!(service.prompts()[0].contains("Question: Create a notes table with one note"));
}

#[tokio::test]
async fn test_compile_question_prose_reply_is_rejected() {
    let service = ScriptedCompletion::new(&[
        "I'm a PostgreSQL bot, I can only answer questions about the database.",
    ]);

    let compiled = compile(
        &service,
        CompileRequest::Question("Tell me a joke"),
        "schema",
        OPTIONS,
    )
    .await
    .unwrap();

    assert!(matches!(compiled, Compiled::Rejected(_)));
}

#[tokio::test]
async fn test_compile_propagates_service_failure() {
    let service = ScriptedCompletion::new(&[]);
    let intent = list_intent("usuarios");
    let result = compile(&service, CompileRequest::Intent(&intent), "schema", OPTIONS).await;
    assert!(result.is_err());
}
