use std::fmt::Write;

/// A backend service the proxy routes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Short name, used for the upstream block and the route prefix
    pub name: String,
    /// Local port the service listens on
    pub port: u16,
}

impl Upstream {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

/// Reverse-proxy site configuration.
///
/// The first upstream serves `/` (and the health path); every further
/// upstream is mounted under its own `/<name>/` prefix.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub server_name: String,
    pub listen_port: u16,
    pub health_path: String,
    pub upstreams: Vec<Upstream>,
}

impl SiteConfig {
    pub fn new(server_name: impl Into<String>, listen_port: u16) -> Self {
        Self {
            server_name: server_name.into(),
            listen_port,
            health_path: "/health".to_string(),
            upstreams: Vec::new(),
        }
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn with_upstream(mut self, upstream: Upstream) -> Self {
        self.upstreams.push(upstream);
        self
    }

    fn upstream_id(&self, upstream: &Upstream) -> String {
        format!("{}_backend", upstream.name.replace('-', "_"))
    }

    /// Render the nginx site file.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for upstream in &self.upstreams {
            let _ = writeln!(out, "upstream {} {{", self.upstream_id(upstream));
            let _ = writeln!(out, "    server 127.0.0.1:{};", upstream.port);
            let _ = writeln!(out, "}}");
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "server {{");
        let _ = writeln!(out, "    listen {};", self.listen_port);
        let _ = writeln!(out, "    server_name {};", self.server_name);

        if let Some(primary) = self.upstreams.first() {
            let _ = writeln!(out);
            let _ = writeln!(out, "    location {} {{", self.health_path);
            let _ = writeln!(
                out,
                "        proxy_pass http://{}{};",
                self.upstream_id(primary),
                self.health_path
            );
            let _ = writeln!(out, "    }}");

            let _ = writeln!(out);
            let _ = writeln!(out, "    location / {{");
            Self::write_proxy_headers(&mut out);
            let _ = writeln!(out, "        proxy_pass http://{};", self.upstream_id(primary));
            let _ = writeln!(out, "    }}");
        }

        for upstream in self.upstreams.iter().skip(1) {
            let _ = writeln!(out);
            let _ = writeln!(out, "    location /{}/ {{", upstream.name);
            Self::write_proxy_headers(&mut out);
            let _ = writeln!(out, "        proxy_pass http://{}/;", self.upstream_id(upstream));
            let _ = writeln!(out, "    }}");
        }

        let _ = writeln!(out, "}}");
        out
    }

    fn write_proxy_headers(out: &mut String) {
        let _ = writeln!(out, "        proxy_set_header Host $host;");
        let _ = writeln!(out, "        proxy_set_header X-Real-IP $remote_addr;");
        let _ = writeln!(
            out,
            "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SiteConfig {
        SiteConfig::new("stack.example.org", 80)
            .with_upstream(Upstream::new("stack-api", 8080))
            .with_upstream(Upstream::new("stack-metrics", 9100))
    }

    #[test]
    fn test_render_declares_one_upstream_per_service() {
        let rendered = sample().render();
        assert!(rendered.contains("upstream stack_api_backend {"));
        assert!(rendered.contains("upstream stack_metrics_backend {"));
        assert!(rendered.contains("server 127.0.0.1:8080;"));
        assert!(rendered.contains("server 127.0.0.1:9100;"));
    }

    #[test]
    fn test_render_server_block() {
        let rendered = sample().render();
        assert!(rendered.contains("listen 80;"));
        assert!(rendered.contains("server_name stack.example.org;"));
    }

    #[test]
    fn test_primary_upstream_serves_root_and_health() {
        let rendered = sample().render();
        assert!(rendered.contains("location /health {"));
        assert!(rendered.contains("proxy_pass http://stack_api_backend/health;"));
        assert!(rendered.contains("location / {"));
        assert!(rendered.contains("proxy_pass http://stack_api_backend;"));
    }

    #[test]
    fn test_secondary_upstream_gets_prefix_route() {
        let rendered = sample().render();
        assert!(rendered.contains("location /stack-metrics/ {"));
        assert!(rendered.contains("proxy_pass http://stack_metrics_backend/;"));
    }

    #[test]
    fn test_proxy_headers_present() {
        let rendered = sample().render();
        assert!(rendered.contains("proxy_set_header Host $host;"));
        assert!(rendered.contains("proxy_set_header X-Forwarded-For"));
    }

    #[test]
    fn test_render_without_upstreams_is_still_a_server() {
        let rendered = SiteConfig::new("empty.example.org", 8088).render();
        assert!(rendered.contains("server {"));
        assert!(rendered.contains("listen 8088;"));
        assert!(!rendered.contains("location"));
    }

    #[test]
    fn test_custom_health_path() {
        let rendered = sample().with_health_path("/healthz").render();
        assert!(rendered.contains("location /healthz {"));
    }
}
