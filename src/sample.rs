//! Built-in sample knowledge base used by `ragops ingest --sample`.

use ragops_core::models::Document;

const SAMPLES: [(&str, &str); 3] = [
    (
        "Dani has Type 1 Bipolar Disorder and ADHD. He prefers direct communication and practical solutions. MLOps priorities include drift detection and automated dashboards.",
        "user_profile_2025.txt",
    ),
    (
        "Production RAG requires robust monitoring. Latency is a key metric. Agentic RAG adds complexity but improves reasoning.",
        "rag_architecture_guide.pdf",
    ),
    (
        "The Tech Stack for the backend includes the Python ecosystem as the main language, Docker and Kubernetes for containerization, and FastAPI for backends. MLflow is used for experiment tracking, and Google Colab for prototyping. Production requires CI/CD, monitoring, and logging.",
        "tech_stack_requirements.txt",
    ),
];

pub fn sample_documents() -> Vec<Document> {
    SAMPLES
        .iter()
        .map(|(text, source)| Document::new(*text, *source))
        .collect()
}
