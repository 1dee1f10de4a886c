//! Task: Start the local file server.
//!
//! Serves `http_directory` on a free port from the configured range so the
//! installer can fetch answer files. No-op without an `http_directory`.

use super::{BuildCtx, log_task_error, task_start};
use crate::net::FileServer;
use crate::pipeline::PipelineTask;
use crate::util::bind_in_range;
use async_trait::async_trait;
use isoforge_shared::errors::BuildResult;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Default)]
pub struct HttpServerTask {
    server: Option<FileServer>,
}

#[async_trait]
impl PipelineTask<BuildCtx> for HttpServerTask {
    async fn run(&mut self, ctx: &mut BuildCtx) -> BuildResult<()> {
        let task_name = self.name();
        let vm = task_start(ctx, task_name);

        let Some(root) = ctx.config.http_dir.clone() else {
            tracing::debug!(vm = %vm, "No http_directory, HTTP server disabled");
            return Ok(());
        };

        ctx.ui.say("Starting HTTP server...");
        let (min, max) = (ctx.config.http_port_min, ctx.config.http_port_max);
        let listener = bind_in_range(&mut ctx.rng, IpAddr::V4(Ipv4Addr::UNSPECIFIED), min, max)
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;
        let server = FileServer::start(root, listener)
            .inspect_err(|e| log_task_error(&vm, task_name, e))?;

        let port = server.local_addr().port();
        ctx.ui.message(&format!("Starting HTTP server on port {}", port));
        ctx.http_port = Some(port);
        self.server = Some(server);
        Ok(())
    }

    async fn cleanup(&mut self, _ctx: &mut BuildCtx) -> BuildResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop().await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http_server"
    }
}
