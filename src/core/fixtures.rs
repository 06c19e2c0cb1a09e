//! Server configuration files generated for individual checks.

use crate::utils::error::Result;
use std::fmt::Write as _;
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct LocationBlock {
    pub path: String,
    pub index: String,
    pub allowed_methods: Vec<String>,
}

impl LocationBlock {
    pub fn new(path: &str, index: &str, allowed_methods: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            index: index.to_string(),
            allowed_methods: allowed_methods.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerBlock {
    pub host: String,
    pub listen: Vec<u16>,
    pub server_name: String,
    pub root: String,
    pub locations: Vec<LocationBlock>,
}

impl ServerBlock {
    /// One GET-only `/` location serving `index`.
    pub fn simple(host: &str, port: u16, server_name: &str, root: &str, index: &str) -> Self {
        Self {
            host: host.to_string(),
            listen: vec![port],
            server_name: server_name.to_string(),
            root: root.to_string(),
            locations: vec![LocationBlock::new("/", index, &["GET"])],
        }
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "server {{");
        let _ = writeln!(out, "    host {};", self.host);
        for port in &self.listen {
            let _ = writeln!(out, "    listen {};", port);
        }
        let _ = writeln!(out, "    server_name {};", self.server_name);
        let _ = writeln!(out, "    root {};", self.root);
        for location in &self.locations {
            let _ = writeln!(out);
            let _ = writeln!(out, "    location {} {{", location.path);
            let _ = writeln!(out, "        index {};", location.index);
            let _ = writeln!(out, "        allowed_methods {};", location.allowed_methods.join(" "));
            let _ = writeln!(out, "    }}");
        }
        let _ = writeln!(out, "}}");
    }
}

/// A rendered config, removed from disk when dropped.
#[derive(Debug)]
pub struct FixtureConfig {
    file: NamedTempFile,
}

impl FixtureConfig {
    pub fn render(blocks: &[ServerBlock]) -> String {
        let mut out = String::new();
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            block.render_into(&mut out);
        }
        out
    }

    pub fn write(blocks: &[ServerBlock]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("webserv-fixture-")
            .suffix(".conf")
            .tempfile()?;
        file.write_all(Self::render(blocks).as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

/// Builders for the configurations the suites need.
#[derive(Debug, Clone)]
pub struct Fixtures {
    host: String,
    root: String,
}

impl Fixtures {
    pub fn new(host: &str, root: &str) -> Self {
        Self {
            host: host.to_string(),
            root: root.to_string(),
        }
    }

    pub fn single(&self, port: u16, server_name: &str) -> Vec<ServerBlock> {
        vec![ServerBlock::simple(&self.host, port, server_name, &self.root, "index.html")]
    }

    /// Two servers on different ports serving different index pages.
    pub fn multi_port(&self, first: u16, second: u16) -> Vec<ServerBlock> {
        vec![
            ServerBlock::simple(&self.host, first, "server1", &self.root, "index.html"),
            ServerBlock::simple(&self.host, second, "server2", &self.root, "dashboard.html"),
        ]
    }

    pub fn duplicate_ports(&self, port: u16) -> Vec<ServerBlock> {
        vec![
            ServerBlock::simple(&self.host, port, "server1", &self.root, "index.html"),
            ServerBlock::simple(&self.host, port, "server2", &self.root, "index.html"),
        ]
    }

    pub fn duplicate_names(&self, first: u16, second: u16) -> Vec<ServerBlock> {
        vec![
            ServerBlock::simple(&self.host, first, "myserver", &self.root, "index.html"),
            ServerBlock::simple(&self.host, second, "myserver", &self.root, "index.html"),
        ]
    }

    pub fn duplicate_locations(&self, port: u16) -> Vec<ServerBlock> {
        let mut block = ServerBlock::simple(&self.host, port, "server1", &self.root, "index.html");
        block.locations = vec![
            LocationBlock::new("/test", "index.html", &["GET"]),
            LocationBlock::new("/test", "index.html", &["POST"]),
        ];
        vec![block]
    }

    /// The same port listed twice inside one server.
    pub fn duplicate_listen(&self, port: u16) -> Vec<ServerBlock> {
        let mut block = ServerBlock::simple(&self.host, port, "test", &self.root, "index.html");
        block.listen = vec![port, port];
        vec![block]
    }
}
