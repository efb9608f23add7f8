//! End-to-end flow tests against a mock GoCD server.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

use pipewright::config::Credentials;
use pipewright::error::ReconcileError;
use pipewright::gocd::GoCdClient;
use pipewright::manifest::Manifest;
use pipewright::reconcile::{Outcome, Reconciler};
use pipewright::spec::PipelineSpec;

fn client_for(server: &ServerGuard) -> GoCdClient {
    let credentials = Credentials {
        login: "admin".to_string(),
        password: "badger".to_string(),
    };
    GoCdClient::new(&server.url(), credentials, false).unwrap()
}

fn make_spec(section: Value) -> PipelineSpec {
    PipelineSpec::from_section(&Manifest::new(section)).unwrap()
}

fn base_section(name: &str, environment: &str) -> Value {
    json!({
        "environment": environment,
        "branch": "master",
        "allowed-branches": ["*"],
        "pipeline": {
            "group": "apps",
            "pipeline": {"name": name}
        }
    })
}

fn group_body(name: &str, members: &[&str]) -> String {
    json!({
        "name": name,
        "pipelines": members.iter().map(|m| json!({"name": m})).collect::<Vec<_>>(),
        "agents": [{"uuid": "a-1"}],
        "environment_variables": [{"name": "TIER", "value": name}]
    })
    .to_string()
}

fn groups_index(groups: &[(&str, &[&str])]) -> String {
    json!({
        "_embedded": {
            "environments": groups
                .iter()
                .map(|(name, members)| {
                    json!({
                        "name": name,
                        "pipelines": members.iter().map(|m| json!({"name": m})).collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>()
        }
    })
    .to_string()
}

#[tokio::test]
async fn new_pipeline_is_created_added_to_group_and_unpaused() {
    let mut server = Server::new_async().await;

    let probe = server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(404)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/go/api/admin/pipelines")
        .match_header("authorization", Matcher::Regex("Basic .+".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "group": "apps",
            "pipeline": {"name": "svc-build"}
        })))
        .with_status(200)
        .create_async()
        .await;
    let fetch_group = server
        .mock("GET", "/go/api/admin/environments/staging")
        .with_status(200)
        .with_header("etag", "G1")
        .with_body(group_body("staging", &["other-svc"]))
        .create_async()
        .await;
    let write_group = server
        .mock("PUT", "/go/api/admin/environments/staging")
        .match_header("if-match", "G1")
        .match_body(Matcher::PartialJson(json!({
            "name": "staging",
            "pipelines": [{"name": "other-svc"}, {"name": "svc-build"}],
            "agents": [{"uuid": "a-1"}]
        })))
        .with_status(200)
        .create_async()
        .await;
    let unpause = server
        .mock("POST", "/go/api/pipelines/svc-build/unpause")
        .match_header("confirm", "true")
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(&server);
    let spec = make_spec(base_section("svc-build", "staging"));
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(outcome, Outcome::Created);
    probe.assert_async().await;
    create.assert_async().await;
    fetch_group.assert_async().await;
    write_group.assert_async().await;
    unpause.assert_async().await;
}

#[tokio::test]
async fn update_migrates_pipeline_between_groups() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(200)
        .with_header("etag", "P1")
        .with_body(json!({"name": "svc-build"}).to_string())
        .create_async()
        .await;
    let update_pipeline = server
        .mock("PUT", "/go/api/admin/pipelines/svc-build")
        .match_header("if-match", "P1")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments")
        .with_status(200)
        .with_body(groups_index(&[("staging", &["svc-build"]), ("prod", &[])]))
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments/staging")
        .with_status(200)
        .with_header("etag", "S1")
        .with_body(group_body("staging", &["svc-build"]))
        .create_async()
        .await;
    let remove_from_staging = server
        .mock("PUT", "/go/api/admin/environments/staging")
        .match_header("if-match", "S1")
        .match_body(Matcher::PartialJson(json!({"name": "staging", "pipelines": []})))
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments/prod")
        .with_status(200)
        .with_header("etag", "R1")
        .with_body(group_body("prod", &[]))
        .create_async()
        .await;
    let add_to_prod = server
        .mock("PUT", "/go/api/admin/environments/prod")
        .match_header("if-match", "R1")
        .match_body(Matcher::PartialJson(json!({
            "name": "prod",
            "pipelines": [{"name": "svc-build"}]
        })))
        .with_status(200)
        .create_async()
        .await;
    let unpause = server
        .mock("POST", "/go/api/pipelines/svc-build/unpause")
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(&server);
    let spec = make_spec(base_section("svc-build", "prod"));
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Migrated {
            from: "staging".to_string()
        }
    );
    update_pipeline.assert_async().await;
    remove_from_staging.assert_async().await;
    add_to_prod.assert_async().await;
    unpause.assert_async().await;
}

#[tokio::test]
async fn update_in_place_reasserts_membership() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(200)
        .with_header("etag", "P1")
        .with_body(json!({"name": "svc-build"}).to_string())
        .create_async()
        .await;
    server
        .mock("PUT", "/go/api/admin/pipelines/svc-build")
        .match_header("if-match", "P1")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments")
        .with_status(200)
        .with_body(groups_index(&[("staging", &["svc-build", "libs-build"])]))
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments/staging")
        .with_status(200)
        .with_header("etag", "S1")
        .with_body(group_body("staging", &["svc-build", "libs-build"]))
        .create_async()
        .await;
    let reassert = server
        .mock("PUT", "/go/api/admin/environments/staging")
        .match_header("if-match", "S1")
        .match_body(Matcher::PartialJson(json!({
            "pipelines": [{"name": "svc-build"}, {"name": "libs-build"}]
        })))
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("POST", "/go/api/pipelines/svc-build/unpause")
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut section = base_section("svc-build", "staging");
    section["depends"] = json!([{"pipeline": "libs-build"}]);
    let spec = make_spec(section);
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(outcome, Outcome::Updated);
    reassert.assert_async().await;
}

#[tokio::test]
async fn blocked_branch_skips_without_remote_calls() {
    let mut server = Server::new_async().await;
    // any request at all would hit this and fail the flow
    let nothing = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut section = base_section("svc-build", "staging");
    section["branch"] = json!("feature/x");
    section["allowed-branches"] = json!(["release/.*"]);
    let spec = make_spec(section);
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(outcome, Outcome::Skipped);
    nothing.assert_async().await;
}

#[tokio::test]
async fn stale_group_token_aborts_flow_before_unpause() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("POST", "/go/api/admin/pipelines")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments/staging")
        .with_status(200)
        .with_header("etag", "T1")
        .with_body(group_body("staging", &[]))
        .create_async()
        .await;
    // token moved to T2 between fetch and write
    server
        .mock("PUT", "/go/api/admin/environments/staging")
        .match_header("if-match", "T1")
        .with_status(412)
        .create_async()
        .await;
    let unpause = server
        .mock("POST", "/go/api/pipelines/svc-build/unpause")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let spec = make_spec(base_section("svc-build", "staging"));
    let err = Reconciler::new(&client).reconcile(&spec).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::ConcurrencyConflict { resource } if resource == "group staging"
    ));
    unpause.assert_async().await;
}

#[tokio::test]
async fn purge_of_nonexistent_pipeline_succeeds() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/environments")
        .with_status(200)
        .with_body(groups_index(&[("staging", &["other-svc"])]))
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/go/api/admin/pipelines/svc-build")
        .with_status(404)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut section = base_section("svc-build", "staging");
    section["purge"] = json!(true);
    let spec = make_spec(section);
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(outcome, Outcome::Deleted);
    delete.assert_async().await;
}

#[tokio::test]
async fn purge_removes_membership_then_deletes() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/environments")
        .with_status(200)
        .with_body(groups_index(&[("staging", &["svc-build", "other-svc"])]))
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments/staging")
        .with_status(200)
        .with_header("etag", "S1")
        .with_body(group_body("staging", &["svc-build", "other-svc"]))
        .create_async()
        .await;
    let remove = server
        .mock("PUT", "/go/api/admin/environments/staging")
        .match_header("if-match", "S1")
        .match_body(Matcher::PartialJson(json!({
            "pipelines": [{"name": "other-svc"}]
        })))
        .with_status(200)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/go/api/admin/pipelines/svc-build")
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut section = base_section("svc-build", "staging");
    section["purge"] = json!(true);
    let spec = make_spec(section);
    let outcome = Reconciler::new(&client).reconcile(&spec).await.unwrap();

    assert_eq!(outcome, Outcome::Deleted);
    remove.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn missing_dependency_fails_before_group_writes() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(200)
        .with_header("etag", "P1")
        .with_body(json!({"name": "svc-build"}).to_string())
        .create_async()
        .await;
    server
        .mock("PUT", "/go/api/admin/pipelines/svc-build")
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("GET", "/go/api/admin/environments")
        .with_status(200)
        .with_body(groups_index(&[
            ("staging", &["svc-build"]),
            ("prod", &["libs-build"]),
        ]))
        .create_async()
        .await;
    let group_write = server
        .mock("PUT", Matcher::Regex("/go/api/admin/environments/.+".to_string()))
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut section = base_section("svc-build", "staging");
    section["depends"] = json!([{"pipeline": "libs-build"}]);
    let spec = make_spec(section);
    let err = Reconciler::new(&client).reconcile(&spec).await.unwrap_err();

    match err {
        ReconcileError::DependencyMissing(missing) => {
            assert_eq!(missing, vec!["libs-build".to_string()]);
        }
        other => panic!("expected DependencyMissing, got {other:?}"),
    }
    group_write.assert_async().await;
}

#[tokio::test]
async fn create_racing_an_existing_pipeline_reports_already_exists() {
    let mut server = Server::new_async().await;

    // probe saw no pipeline, but another actor created it in between
    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("POST", "/go/api/admin/pipelines")
        .with_status(422)
        .with_body("pipeline with name 'svc-build' already exists")
        .create_async()
        .await;
    let group_write = server
        .mock("PUT", Matcher::Regex("/go/api/admin/environments/.+".to_string()))
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let spec = make_spec(base_section("svc-build", "staging"));
    let err = Reconciler::new(&client).reconcile(&spec).await.unwrap_err();

    assert!(matches!(err, ReconcileError::PipelineExists(name) if name == "svc-build"));
    group_write.assert_async().await;
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/go/api/admin/pipelines/svc-build")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let client = client_for(&server);
    let spec = make_spec(base_section("svc-build", "staging"));
    let err = Reconciler::new(&client).reconcile(&spec).await.unwrap_err();

    match err {
        ReconcileError::RemoteServer { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected RemoteServer, got {other:?}"),
    }
}
