//! Tests against the bundled compose samples
//!
//! The samples under `samples/` are real-world compose files; these tests
//! pin down the playbooks generated from them.

use serde_yaml::Value;
use std::path::PathBuf;

/// Get a command instance for the compose2ansible binary
fn c2a_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("compose2ansible"));
    cmd.env(
        "COMPOSE2ANSIBLE_CONFIG",
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/defaults.toml"),
    );
    cmd
}

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .join(name)
        .join("docker-compose.yml")
}

/// Runs the converter on a sample and returns the generated task list
fn convert_sample(name: &str, args: &[&str]) -> Vec<Value> {
    let output = c2a_cmd()
        .args(["--kind", "tasks"])
        .args(args)
        .arg(sample(name))
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.starts_with("---\n"));

    match serde_yaml::from_str(&stdout).unwrap() {
        Value::Sequence(tasks) => tasks,
        other => panic!("expected a task list, got {:?}", other),
    }
}

const CONTAINER: &str = "containers.podman.podman_container";
const NETWORK: &str = "containers.podman.podman_network";
const VOLUME: &str = "containers.podman.podman_volume";

fn module_tasks<'a>(tasks: &'a [Value], module: &str) -> Vec<&'a Value> {
    tasks.iter().filter(|t| t.get(module).is_some()).collect()
}

fn container_names(tasks: &[Value]) -> Vec<String> {
    module_tasks(tasks, CONTAINER)
        .iter()
        .map(|t| t[CONTAINER]["name"].as_str().unwrap().to_string())
        .collect()
}

fn task_names(tasks: &[Value]) -> Vec<String> {
    tasks
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// GitLab
// =============================================================================

#[test]
fn test_gitlab_single_container() {
    let tasks = convert_sample("gitlab", &[]);

    assert_eq!(tasks.len(), 1);
    assert!(module_tasks(&tasks, NETWORK).is_empty());

    let container = &tasks[0][CONTAINER];
    assert_eq!(container["name"], Value::from("web"));
    assert_eq!(container["image"], Value::from("docker.io/gitlab/gitlab-ee:latest"));
    assert_eq!(container["hostname"], Value::from("gitlab.example.com"));
    assert_eq!(container["restart_policy"], Value::from("always"));
    assert_eq!(container["shm_size"], Value::from("256m"));
    assert!(container.get("state").is_none());

    let ports: Vec<_> = container["ports"].as_sequence().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(ports, vec!["80:80", "443:443", "22:22"]);

    let volumes: Vec<_> = container["volumes"].as_sequence().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(
        volumes,
        vec![
            "{{ lookup('env', 'GITLAB_HOME') }}/config:/etc/gitlab:Z",
            "{{ lookup('env', 'GITLAB_HOME') }}/logs:/var/log/gitlab:Z",
            "{{ lookup('env', 'GITLAB_HOME') }}/data:/var/opt/gitlab:Z",
        ]
    );

    let omnibus = container["env"]["GITLAB_OMNIBUS_CONFIG"].as_str().unwrap();
    assert!(omnibus.contains("external_url 'https://gitlab.example.com'"));
}

#[test]
fn test_gitlab_playbook_envelope() {
    let output = c2a_cmd().arg(sample("gitlab")).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let plays: Value = serde_yaml::from_str(&stdout).unwrap();

    assert_eq!(plays[0]["name"], Value::from("Deploy compose services"));
    assert_eq!(plays[0]["hosts"], Value::from("localhost"));
    assert_eq!(plays[0]["become"], Value::from(true));
    assert_eq!(plays[0]["tasks"].as_sequence().unwrap().len(), 1);
}

// =============================================================================
// Nextcloud
// =============================================================================

#[test]
fn test_nextcloud_creation_order() {
    let tasks = convert_sample("nextcloud", &[]);

    assert_eq!(
        task_names(&tasks),
        vec![
            "deploy volume nextcloud",
            "deploy volume db",
            "deploy network nw-db-app-web",
            "deploy container db",
            "deploy container app",
            "deploy container web",
        ]
    );
    assert_eq!(module_tasks(&tasks, VOLUME).len(), 2);
}

#[test]
fn test_nextcloud_teardown_order() {
    let tasks = convert_sample("nextcloud", &["--state", "absent"]);

    assert_eq!(container_names(&tasks), vec!["web", "app", "db"]);
    assert_eq!(
        task_names(&tasks).last().map(String::as_str),
        Some("destroy volume nextcloud")
    );
    for task in module_tasks(&tasks, CONTAINER) {
        assert_eq!(task[CONTAINER]["state"], Value::from("absent"));
    }
}

#[test]
fn test_nextcloud_services_share_network() {
    let tasks = convert_sample("nextcloud", &[]);

    for task in module_tasks(&tasks, CONTAINER) {
        assert_eq!(task[CONTAINER]["network"], Value::from("nw-db-app-web"));
    }
}

#[test]
fn test_nextcloud_container_details() {
    let tasks = convert_sample("nextcloud", &[]);
    let containers = module_tasks(&tasks, CONTAINER);

    let db = &containers[0][CONTAINER];
    assert_eq!(db["image"], Value::from("docker.io/library/mariadb:10.6"));
    assert_eq!(db["volumes"][0], Value::from("db:/var/lib/mysql:Z"));
    assert_eq!(
        db["env"]["MYSQL_PASSWORD"],
        Value::from("{{ lookup('env', 'MYSQL_PASSWORD') }}")
    );
    assert_eq!(db["env"]["MYSQL_DATABASE"], Value::from("nextcloud"));

    // web mounts app's volumes, so app relabels them as shared
    let app = &containers[1][CONTAINER];
    assert_eq!(app["volumes"][0], Value::from("nextcloud:/var/www/html:z"));

    let web = &containers[2][CONTAINER];
    assert_eq!(web["image"], Value::from("docker.io/library/nginx"));
    assert_eq!(web["ports"][0], Value::from("8080:80"));
    assert_eq!(web["volumes_from"][0], Value::from("app"));
}

#[test]
fn test_present_and_absent_agree_on_names() {
    let present = convert_sample("nextcloud", &[]);
    let absent = convert_sample("nextcloud", &["--state", "absent"]);

    let mut expected: Vec<String> = task_names(&present)
        .iter()
        .map(|name| name.replacen("deploy", "destroy", 1))
        .collect();
    expected.reverse();
    assert_eq!(task_names(&absent), expected);
}
