use crate::errors::*;
use crate::reference::ImageRef;
use crate::registry::DigestResolver;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

pub const CSV: &str = r#"apiVersion: operators.coreos.com/v1alpha1
kind: ClusterServiceVersion
metadata:
  annotations:
    containerImage: quay.io/example/memcached-operator:v0.0.1
    capabilities: Basic Install
  name: memcached-operator.v0.0.1
  namespace: placeholder
spec:
  displayName: Memcached Operator
  install:
    spec:
      clusterPermissions:
      - rules:
        - apiGroups:
          - cache.example.com
          resources:
          - memcacheds
          verbs:
          - get
          - list
        serviceAccountName: memcached-operator-controller-manager
      deployments:
      - label:
          control-plane: controller-manager
        name: memcached-operator-controller-manager
        spec:
          replicas: 1
          selector:
            matchLabels:
              control-plane: controller-manager
          strategy: {}
          template:
            metadata:
              labels:
                control-plane: controller-manager
            spec:
              containers:
              - args:
                - --secure-listen-address=0.0.0.0:8443
                - --v=0
                image: gcr.io/kubebuilder/kube-rbac-proxy:v0.13.1
                name: kube-rbac-proxy
                resources: {}
              - args:
                - --leader-elect
                command:
                - /manager
                image: quay.io/example/memcached-operator:v0.0.1
                name: manager
                resources:
                  limits:
                    cpu: 500m
                    memory: 128Mi
              serviceAccountName: memcached-operator-controller-manager
              terminationGracePeriodSeconds: 10
      - name: memcached-webhook
        spec:
          replicas: 2
          selector:
            matchLabels:
              app: webhook
          template:
            metadata:
              labels:
                app: webhook
            spec:
              initContainers:
              - image: quay.io/example/migrations:v3
                name: migrations
              containers:
              - image: quay.io/example/memcached-webhook
                name: webhook
              - image: quay.io/example/sidecar@sha256:cafef00d
                name: sidecar
    strategy: deployment
  installModes:
  - supported: true
    type: OwnNamespace
  - supported: false
    type: AllNamespaces
  relatedImages:
  - image: quay.io/example/memcached-operator:v0.0.1
    name: manager
  version: 0.0.1
status:
  cleanup: {}
  conditions:
  - phase: Succeeded
"#;

/// A manifest with one deployment running the given images, plus a status
pub fn containers(images: &[&str]) -> String {
    let mut yaml = String::from(
        r#"apiVersion: operators.coreos.com/v1alpha1
kind: ClusterServiceVersion
metadata:
  name: app.v1.0.0
spec:
  install:
    strategy: deployment
    spec:
      deployments:
      - name: app
        spec:
          template:
            spec:
              containers:
"#,
    );
    for (idx, image) in images.iter().enumerate() {
        yaml.push_str(&format!(
            "              - name: container-{idx}\n                image: {image}\n"
        ));
    }
    yaml.push_str("status:\n  phase: Succeeded\n");
    yaml
}

pub fn single_container(image: &str) -> String {
    containers(&[image])
}

pub const KUBE_RBAC_PROXY_DIGEST: &str =
    "sha256:d4883d7c622683b3319b5e6b3a7edfbf2594c18060131a8bf64504805f875522";
pub const OPERATOR_DIGEST: &str =
    "sha256:5e3b5ed7e13dc7a4a1b49a5ec3b4a0a5a0f46d1bdde7d3df9e2b3d5f1e26d14a";
pub const WEBHOOK_DIGEST: &str =
    "sha256:0b1e1c3e0f0f6d8e2e0b85a2b8a1c4ac4c4b83a7d6e1f7c3b2a1e0d9c8b7a695";

/// In-memory registry that knows a fixed set of tags
#[derive(Debug, Default)]
pub struct FixedRegistry {
    digests: HashMap<String, String>,
    lookups: RefCell<Vec<String>>,
}

impl FixedRegistry {
    pub fn new<'a, I>(digests: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        FixedRegistry {
            digests: digests
                .into_iter()
                .map(|(image, digest)| (image.to_string(), digest.to_string()))
                .collect(),
            lookups: RefCell::default(),
        }
    }

    /// Registry that can resolve every tagged image in [`CSV`]
    pub fn for_csv() -> Self {
        Self::new([
            (
                "gcr.io/kubebuilder/kube-rbac-proxy:v0.13.1",
                KUBE_RBAC_PROXY_DIGEST,
            ),
            ("quay.io/example/memcached-operator:v0.0.1", OPERATOR_DIGEST),
            ("quay.io/example/memcached-webhook", WEBHOOK_DIGEST),
        ])
    }

    /// Every image that was looked up, in order
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }
}

impl DigestResolver for FixedRegistry {
    async fn resolve_digest(&self, image: &ImageRef) -> Result<String> {
        let image = image.to_string();
        self.lookups.borrow_mut().push(image.clone());
        self.digests
            .get(&image)
            .cloned()
            .with_context(|| anyhow!("Manifest unknown: {image:?}"))
    }
}

/// A request received by [`MockRegistry`]
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
pub struct Response {
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
}

/// Plain http registry on a random local port, one request per connection
pub struct MockRegistry {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockRegistry {
    pub fn start<F>(handler: F) -> Result<Self>
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        Self::start_with_host(move |_, req| handler(req))
    }

    /// Like [`MockRegistry::start`], the handler also gets the `host:port` it's served on
    pub fn start_with_host<F>(handler: F) -> Result<Self>
    where
        F: Fn(&str, &Request) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handler = Arc::new(handler);
        let log = Arc::clone(&requests);
        let host = addr.to_string();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                let host = host.clone();
                thread::spawn(move || serve(stream, &host, handler.as_ref(), &log));
            }
        });

        Ok(MockRegistry { addr, requests })
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// `METHOD path` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn ok() -> Response {
        Response {
            status: "200 OK",
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn digest(digest: &str) -> Response {
        Response {
            status: "200 OK",
            headers: vec![
                (
                    "Content-Type",
                    "application/vnd.oci.image.index.v1+json".to_string(),
                ),
                ("Docker-Content-Digest", digest.to_string()),
            ],
            body: String::new(),
        }
    }

    pub fn json(body: &str) -> Response {
        Response {
            status: "200 OK",
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn unauthorized(challenge: &str) -> Response {
        Response {
            status: "401 Unauthorized",
            headers: vec![("WWW-Authenticate", challenge.to_string())],
            body: r#"{"errors":[{"code":"UNAUTHORIZED","message":"authentication required"}]}"#
                .to_string(),
        }
    }

    pub fn not_found() -> Response {
        Response {
            status: "404 Not Found",
            headers: vec![("Content-Type", "application/json".to_string())],
            body: r#"{"errors":[{"code":"MANIFEST_UNKNOWN","message":"manifest unknown"}]}"#
                .to_string(),
        }
    }
}

fn serve<F>(stream: TcpStream, host: &str, handler: &F, log: &Mutex<Vec<String>>) -> io::Result<()>
where
    F: Fn(&str, &Request) -> Response,
{
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let request = Request {
        method,
        path,
        headers,
    };
    log.lock()
        .unwrap()
        .push(format!("{} {}", request.method, request.path));
    let response = handler(host, &request);

    let mut stream = stream;
    write!(stream, "HTTP/1.1 {}\r\n", response.status)?;
    for (key, value) in &response.headers {
        write!(stream, "{key}: {value}\r\n")?;
    }
    write!(
        stream,
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    )?;
    if request.method != "HEAD" {
        stream.write_all(response.body.as_bytes())?;
    }
    stream.flush()
}
