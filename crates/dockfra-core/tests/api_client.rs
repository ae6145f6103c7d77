use dockfra_core::action::FormSnapshot;
use dockfra_core::panels::{ProcessAction, ProcessStatus};
use dockfra_core::ticket::TicketStatus;
use dockfra_core::{ChatRole, WizardClient};
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn client() -> (MockServer, WizardClient) {
    let server = MockServer::start().await;
    let client = WizardClient::new(&server.uri()).unwrap();
    (server, client)
}

#[tokio::test]
async fn test_logs_tail_sends_count() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/logs/tail"))
        .and(query_param("n", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "lines": ["plain", {"text": "✅ done", "ts": "12:00"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tail = client.logs_tail(200).await.unwrap();
    assert_eq!(tail.total, 3);
    let texts: Vec<&str> = tail.lines.iter().map(|l| l.text()).collect();
    assert_eq!(texts, vec!["plain", "✅ done"]);
}

#[tokio::test]
async fn test_history_replay() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": [
                {"id": "m1", "role": "bot", "text": "Witaj"},
                {"role": "user", "text": "status"}
            ],
            "logs": [{"id": "l1", "text": "boot"}]
        })))
        .mount(&server)
        .await;

    let history = client.history().await.unwrap();
    assert_eq!(history.conversation.len(), 2);
    assert_eq!(history.conversation[1].role, ChatRole::User);
    assert_eq!(history.logs[0].text, "boot");
    assert!(history.current_step.is_none());
}

#[tokio::test]
async fn test_processes_and_ticket_diff() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/processes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "dockfra-app", "status": "stopped", "type": "container", "details": "Exited (1)"},
            {"name": "ssh-tunnel", "status": "sleeping"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ticket-diff/T-0007"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "diff": "diff --git a/x b/x\n+added",
            "commits": [{"hash": "abc123", "subject": "Fix", "repo": "app"}],
            "title": "Fix login",
            "status": "review"
        })))
        .mount(&server)
        .await;

    let processes = client.processes().await.unwrap();
    assert_eq!(processes[0].status, ProcessStatus::Stopped);
    assert!(processes[0].is_container());
    assert_eq!(processes[0].fix_action().as_deref(), Some("fix_container::dockfra-app"));
    assert_eq!(processes[1].status, ProcessStatus::Unknown);

    let diff = client.ticket_diff("T-0007").await.unwrap();
    assert!(diff.has_diff());
    assert!(diff.has_commits());
    assert_eq!(diff.title.as_deref(), Some("Fix login"));
}

#[tokio::test]
async fn test_ticket_detail() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/T-0002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T-0002",
            "title": "Add metrics",
            "status": "in_progress",
            "comments": [{"author": "manager", "text": "ok"}]
        })))
        .mount(&server)
        .await;

    let ticket = client.ticket("T-0002").await.unwrap();
    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert_eq!(ticket.priority, "normal");
    assert_eq!(ticket.recent_comments().len(), 1);
}

#[tokio::test]
async fn test_process_action_posts_port() {
    let (server, client) = client().await;
    Mock::given(method("POST"))
        .and(path("/api/process/change_port/web"))
        .and(body_json(json!({"port": "8081"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "port changed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .process_action(&ProcessAction::ChangePort("8081".to_string()), "web")
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.message, "port changed");
}

#[tokio::test]
async fn test_action_over_http() {
    let (server, client) = client().await;
    Mock::given(method("POST"))
        .and(path("/api/action"))
        .and(body_json(json!({
            "action": "ticket_create_do",
            "form": {"ticket_title": "Nowy"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let mut form = FormSnapshot::new();
    form.insert("ticket_title".to_string(), "Nowy".to_string());
    let response = client.action("ticket_create_do", &form).await.unwrap();
    assert!(response.ok);
    assert!(response.error.is_none());
}

#[tokio::test]
async fn test_options_endpoint_and_scan() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/ssh-options/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "options": [{"value": "T-0001", "label": "T-0001 Fix login"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/device-ips"))
        .and(query_param("scan", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docker": [{"name": "dockfra-app", "ip": "172.18.0.2"}],
            "arp": []
        })))
        .mount(&server)
        .await;

    let options = client.options("/api/ssh-options/tickets").await.unwrap();
    assert_eq!(options[0].value, "T-0001");

    let devices = client.device_ips(true).await.unwrap();
    assert_eq!(devices.docker[0].ip, "172.18.0.2");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (server, client) = client().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/process/stop/web"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such process"))
        .mount(&server)
        .await;

    let err = client.stats().await.unwrap_err();
    assert!(err.to_string().contains("500"));

    let err = client.process_action(&ProcessAction::Stop, "web").await.unwrap_err();
    assert!(err.to_string().contains("no such process"));
}
