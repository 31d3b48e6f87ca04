//! Build recipe resolution
//!
//! A source tree is built from its own `Dockerfile` when it has one;
//! otherwise a recipe is generated from the first recognised project marker.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ControllerError;
use crate::filesys::file::File;

pub const RECIPE_FILE: &str = "Dockerfile";

/// Kind of project found in a source tree, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Dockerfile,
    Node,
    Python,
    Go,
}

impl ProjectKind {
    /// Marker file identifying this kind
    pub fn marker(&self) -> &'static str {
        match self {
            ProjectKind::Dockerfile => RECIPE_FILE,
            ProjectKind::Node => "package.json",
            ProjectKind::Python => "requirements.txt",
            ProjectKind::Go => "go.mod",
        }
    }

    /// Generated recipe; `None` when the tree brings its own
    pub fn template(&self) -> Option<&'static str> {
        match self {
            ProjectKind::Dockerfile => None,
            ProjectKind::Node => Some(NODE_TEMPLATE),
            ProjectKind::Python => Some(PYTHON_TEMPLATE),
            ProjectKind::Go => Some(GO_TEMPLATE),
        }
    }
}

const DETECTION_ORDER: [ProjectKind; 4] = [
    ProjectKind::Dockerfile,
    ProjectKind::Node,
    ProjectKind::Python,
    ProjectKind::Go,
];

const NODE_TEMPLATE: &str = "FROM node:18-alpine
WORKDIR /app
COPY package*.json ./
RUN npm install
COPY . .
RUN npm run build
EXPOSE 3000
CMD [\"npm\", \"start\"]
";

const PYTHON_TEMPLATE: &str = "FROM python:3.11-slim
WORKDIR /app
COPY requirements.txt .
RUN pip install -r requirements.txt
COPY . .
EXPOSE 8000
CMD [\"python\", \"app.py\"]
";

const GO_TEMPLATE: &str = "FROM golang:1.21-alpine AS builder
WORKDIR /app
COPY go.mod go.sum* ./
RUN go mod download
COPY . .
RUN go build -o app .

FROM alpine:latest
RUN apk --no-cache add ca-certificates
WORKDIR /root/
COPY --from=builder /app/app .
EXPOSE 8080
CMD [\"./app\"]
";

/// Detect the project kind of a source tree
pub fn detect(source_dir: &Path) -> Option<ProjectKind> {
    DETECTION_ORDER
        .into_iter()
        .find(|kind| source_dir.join(kind.marker()).is_file())
}

/// Resolve the recipe for a source tree, writing a generated one into the
/// tree when needed, and return its path
pub async fn resolve(source_dir: &Path) -> Result<PathBuf, ControllerError> {
    let kind = detect(source_dir).ok_or_else(|| {
        ControllerError::RecipeError("could not detect project type".to_string())
    })?;

    let recipe = source_dir.join(RECIPE_FILE);
    match kind.template() {
        None => debug!("Using existing {}", recipe.display()),
        Some(template) => {
            info!("Detected {:?} project, generating {}", kind, RECIPE_FILE);
            File::new(&recipe).write_string(template).await?;
        }
    }
    Ok(recipe)
}
