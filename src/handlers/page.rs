use aps_issues::SessionFlags;
use axum::{response::Html, Extension};

use crate::sessions::SharedSession;
use crate::utils::logging::*;

/// GET /
///
/// Um carregamento completo derruba os tokens vivos; issues já carregadas
/// continuam disponíveis em `/api/issues`
pub async fn index(Extension(session): Extension<SharedSession>) -> Html<String> {
    let mut web = session.lock().await;
    if web.session.is_authenticated() {
        log_info("🔄 Página recarregada: tokens descartados, nova autenticação necessária");
    }
    web.reset_auth();
    Html(render_index(None, &web.session.flags()))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_index(banner: Option<&str>, flags: &SessionFlags) -> String {
    let banner_html = banner
        .map(|text| format!(r#"<div class="banner">{}</div>"#, escape_html(text)))
        .unwrap_or_default();

    INDEX_PAGE
        .replace("{{banner}}", &banner_html)
        .replace("{{authenticated}}", &flags.authenticated.to_string())
        .replace("{{three_legged}}", &flags.three_legged.to_string())
}

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <title>ACC Issues</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; background: #f4f6f8; color: #222; }
        header { background: #0696d7; color: white; padding: 16px 32px; }
        main { padding: 24px 32px; }
        .banner { background: #fff8e1; border-left: 4px solid #ffb300; padding: 12px; margin-bottom: 16px; }
        .card { background: white; border-radius: 8px; padding: 16px; margin-bottom: 16px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
        button, select, input { margin: 4px; padding: 6px 10px; }
        table { border-collapse: collapse; width: 100%; font-size: 13px; }
        th, td { border: 1px solid #ddd; padding: 4px 8px; text-align: left; vertical-align: top; }
        th { background: #eef3f7; }
        .muted { color: #777; }
        .error { color: #c62828; }
    </style>
</head>
<body>
    <header><h1>📋 ACC Issues</h1></header>
    <main>
        {{banner}}
        <div class="card">
            <strong>Autenticação</strong>
            <span id="auth-state" class="muted"></span><br>
            <button id="btn-2legged">Conectar (2-legged)</button>
            <a href="/auth/login"><button>Login Autodesk (3-legged)</button></a>
            <button id="btn-logout">Sair</button>
        </div>
        <div class="card">
            <strong>Projeto</strong><br>
            <select id="hubs"><option value="">Hubs...</option></select>
            <select id="projects"><option value="">Projetos...</option></select>
            <div id="hub-message" class="muted"></div>
        </div>
        <div class="card">
            <strong>Filtros</strong><br>
            <select id="issue-types"><option value="">Todos os tipos</option></select>
            <select id="status">
                <option value="">Todos os status</option>
                <option value="open">open</option>
                <option value="closed">closed</option>
                <option value="in_progress">in_progress</option>
                <option value="resolved">resolved</option>
            </select>
            <button id="btn-issues">Buscar issues</button>
            <a href="/api/export?format=csv"><button>Exportar CSV</button></a>
            <a href="/api/export?format=xlsx"><button>Exportar Excel</button></a>
        </div>
        <div id="message" class="error"></div>
        <div class="card"><div id="issues" class="muted">Nenhuma issue carregada.</div></div>
    </main>
    <script>
        const state = { authenticated: {{authenticated}}, threeLegged: {{three_legged}} };
        const $ = (id) => document.getElementById(id);

        function showAuth() {
            $('auth-state').textContent = state.threeLegged ? '3-legged ativo'
                : (state.authenticated ? '2-legged ativo' : 'não autenticado');
        }

        async function api(path, options) {
            const response = await fetch(path, options);
            const body = await response.json();
            if (!response.ok) { throw new Error(body.error || response.statusText); }
            return body;
        }

        function fail(err) { $('message').textContent = err.message; }

        function fill(select, items, label, placeholder) {
            select.innerHTML = '';
            const first = document.createElement('option');
            first.value = ''; first.textContent = placeholder;
            select.appendChild(first);
            for (const item of items) {
                const option = document.createElement('option');
                option.value = item.id; option.textContent = label(item);
                select.appendChild(option);
            }
        }

        function renderIssues(body) {
            if (!body.issues || body.issues.length === 0) {
                $('issues').textContent = body.loaded === false ? 'Nenhuma issue carregada.' : 'Nenhuma issue encontrada.';
                return;
            }
            const columns = [...new Set(body.issues.flatMap(Object.keys))];
            const table = document.createElement('table');
            const head = table.insertRow();
            for (const c of columns) { const th = document.createElement('th'); th.textContent = c; head.appendChild(th); }
            for (const issue of body.issues) {
                const row = table.insertRow();
                for (const c of columns) {
                    const v = issue[c];
                    row.insertCell().textContent = v == null ? '' : (typeof v === 'object' ? JSON.stringify(v) : v);
                }
            }
            $('issues').innerHTML = '';
            const summary = document.createElement('p');
            summary.textContent = body.count + ' issues' + (body.limit_reached ? ' (limite de 200 atingido)' : '');
            $('issues').appendChild(summary);
            $('issues').appendChild(table);
        }

        async function loadHubs() {
            const body = await api('/api/hubs');
            fill($('hubs'), body.hubs, (h) => h.name, 'Hubs...');
            $('hub-message').textContent = body.message || '';
        }

        $('btn-2legged').onclick = async () => {
            try {
                const body = await api('/api/auth/2legged', { method: 'POST' });
                state.authenticated = body.session.authenticated;
                showAuth();
                await loadHubs();
            } catch (err) { fail(err); }
        };

        $('btn-logout').onclick = async () => {
            const body = await api('/auth/logout', { method: 'POST' });
            state.authenticated = body.session.authenticated;
            state.threeLegged = body.session.three_legged;
            showAuth();
        };

        $('hubs').onchange = async () => {
            try {
                const body = await api('/api/hubs/' + encodeURIComponent($('hubs').value) + '/projects');
                fill($('projects'), body.projects, (p) => p.name, 'Projetos...');
            } catch (err) { fail(err); }
        };

        function projectQuery() {
            return encodeURIComponent($('projects').value);
        }

        $('projects').onchange = async () => {
            try {
                const hub = encodeURIComponent($('hubs').value);
                const body = await api('/api/projects/' + projectQuery() + '/issue-types?hub_id=' + hub);
                fill($('issue-types'), body.issue_types, (t) => t.title, 'Todos os tipos');
            } catch (err) { fail(err); }
        };

        $('btn-issues').onclick = async () => {
            try {
                const params = new URLSearchParams({
                    hub_id: $('hubs').value,
                    issue_type: $('issue-types').value,
                    status: $('status').value,
                });
                renderIssues(await api('/api/projects/' + projectQuery() + '/issues?' + params));
                $('message').textContent = '';
            } catch (err) { fail(err); }
        };

        showAuth();
        api('/api/issues').then(renderIssues).catch(fail);
        if (state.authenticated) { loadHubs().catch(fail); }
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_index_escapes_banner() {
        let html = render_index(Some("<b>falha</b>"), &SessionFlags::default());
        assert!(html.contains("&lt;b&gt;falha&lt;/b&gt;"));
        assert!(html.contains("authenticated: false"));
        assert!(!html.contains("{{"));
    }
}
