use axum::response::Html;

const MENU_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>RAG Chatbot</title></head>
<body>
  <h1>RAG Chatbot</h1>

  <h2>Upload documents</h2>
  <form action="/ingest" method="post" enctype="multipart/form-data">
    <input type="file" name="files" multiple accept=".txt,.md,.pdf,.docx">
    <button type="submit">Ingest</button>
  </form>

  <h2>Ask a question</h2>
  <form action="/chat" method="post">
    <input type="text" name="query" size="60" placeholder="Your question">
    <button type="submit">Ask</button>
  </form>
</body>
</html>
"#;

pub async fn menu() -> Html<&'static str> {
    Html(MENU_HTML)
}
