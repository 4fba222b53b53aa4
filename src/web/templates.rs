//! # Maud Templates
//!
//! Server-side HTML for the demo chat page. Everything is rendered
//! from Rust — no build step, no frontend framework. The page keeps
//! the conversation history in a JS array and replays it on every
//! request so the server stays stateless.

use maud::{html, Markup, DOCTYPE};

/// Demo school id baked into the page. Real deployments put the
/// caller's school id behind their auth layer instead.
const DEMO_SCHOOL_ID: &str = "school-1";

/// Full chat page: RTL Persian layout, message log, input bar, and the
/// fetch-stream script that consumes the `/chat` SSE response.
pub fn index() -> Markup {
    html! {
        (DOCTYPE)
        html lang="fa" dir="rtl" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "کارنامه — دستیار مدیر مدرسه" }
                style { (STYLES) }
            }
            body {
                header {
                    h1 { "📋 کارنامه" }
                    p.subtitle { "گزارش فعالیت دانش‌آموزان، به زبان خودتان بپرسید" }
                }
                main {
                    div #log {}
                    form #composer {
                        input #message type="text" autocomplete="off"
                            placeholder="مثلاً: دانش آموز علی احمدی در درس ریاضی چطوره؟";
                        button type="submit" { "ارسال" }
                    }
                }
                script { (maud::PreEscaped(SCRIPT)) }
            }
        }
    }
}

const STYLES: &str = "\
:root { color-scheme: light; }
body { font-family: 'Vazirmatn', Tahoma, sans-serif; margin: 0; background: #f6f7fb; color: #1c2333; }
header { padding: 1.2rem 1.5rem; background: #273469; color: #fff; }
header h1 { margin: 0; font-size: 1.3rem; }
header .subtitle { margin: .25rem 0 0; font-size: .85rem; opacity: .8; }
main { max-width: 760px; margin: 0 auto; padding: 1rem; }
#log { display: flex; flex-direction: column; gap: .6rem; min-height: 50vh; }
.msg { padding: .7rem .9rem; border-radius: .6rem; white-space: pre-wrap; line-height: 1.8; }
.msg.user { background: #dbe4ff; align-self: flex-start; }
.msg.assistant { background: #fff; border: 1px solid #e2e6f0; align-self: stretch; }
.msg.error { background: #ffe3e3; border: 1px solid #ffc9c9; }
#composer { display: flex; gap: .5rem; margin-top: 1rem; }
#composer input { flex: 1; padding: .7rem .9rem; border: 1px solid #cdd4e3; border-radius: .6rem; font: inherit; }
#composer button { padding: .7rem 1.4rem; border: 0; border-radius: .6rem; background: #273469; color: #fff; font: inherit; cursor: pointer; }
#composer button:disabled { opacity: .5; }
";

/// Streams the POST /chat response: splits the body on newlines, keeps a
/// partial-line buffer across chunks, and handles each `data:` payload.
const SCRIPT: &str = r#"
const log = document.getElementById('log');
const form = document.getElementById('composer');
const input = document.getElementById('message');
const button = form.querySelector('button');
const history = [];

function bubble(cls, text) {
  const div = document.createElement('div');
  div.className = 'msg ' + cls;
  div.textContent = text;
  log.appendChild(div);
  div.scrollIntoView({ behavior: 'smooth', block: 'end' });
  return div;
}

form.addEventListener('submit', async (e) => {
  e.preventDefault();
  const text = input.value.trim();
  if (!text) return;
  input.value = '';
  button.disabled = true;
  bubble('user', text);
  history.push({ role: 'user', content: text });
  const reply = bubble('assistant', '');

  try {
    const res = await fetch('/chat', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json', 'x-school-id': 'school-1' },
      body: JSON.stringify({ messages: history }),
    });
    if (!res.ok) {
      const body = await res.json().catch(() => ({ error: 'request failed' }));
      reply.className = 'msg error';
      reply.textContent = body.error;
      return;
    }
    const reader = res.body.getReader();
    const decoder = new TextDecoder();
    let buffer = '';
    for (;;) {
      const { done, value } = await reader.read();
      if (done) break;
      buffer += decoder.decode(value, { stream: true });
      const lines = buffer.split('\n');
      buffer = lines.pop();
      for (const line of lines) {
        if (!line.startsWith('data:')) continue;
        const payload = line.slice(5).trim();
        if (!payload) continue;
        let event;
        try { event = JSON.parse(payload); } catch { continue; }
        if (event.type === 'Delta') reply.textContent += event.text;
        else if (event.type === 'Error') { reply.className = 'msg error'; reply.textContent = event.message; }
      }
    }
    history.push({ role: 'assistant', content: reply.textContent });
  } catch (err) {
    reply.className = 'msg error';
    reply.textContent = 'ارتباط با سرور برقرار نشد.';
  } finally {
    button.disabled = false;
    input.focus();
  }
});
"#;
