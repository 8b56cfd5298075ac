//! Page scripts evaluated through `Runtime.evaluate`.
//!
//! Each script is an arrow function invoked with JSON-encoded arguments inside
//! an IIFE that also defines the shared helpers, so repeated evaluation never
//! redeclares globals. Element refs live in the `data-bridge-ref` attribute and
//! are minted from a per-document counter, which keeps them stable across
//! snapshots of the same page.

use bridge_protocol::SnapshotFilter;

pub const REF_ATTRIBUTE: &str = "data-bridge-ref";

/// Helpers shared by every script: ref minting, role and accessible-name
/// heuristics, visibility.
const HELPERS_JS: &str = r#"
    const REF_ATTR = 'data-bridge-ref';
    const SKIP_TAGS = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'HEAD', 'META', 'LINK']);
    const INTERACTIVE_ROLES = new Set([
        'button', 'link', 'textbox', 'checkbox', 'radio', 'combobox', 'listbox', 'option',
        'menuitem', 'tab', 'switch', 'slider', 'searchbox', 'spinbutton'
    ]);
    const LEAF_ROLES = new Set([
        'button', 'link', 'textbox', 'checkbox', 'radio', 'combobox', 'img', 'heading',
        'option', 'searchbox', 'spinbutton', 'slider', 'switch', 'menuitem', 'tab'
    ]);

    function refOf(el) {
        let ref = el.getAttribute(REF_ATTR);
        if (!ref) {
            window.__bridgeRefCounter = (window.__bridgeRefCounter || 0) + 1;
            ref = 'e' + window.__bridgeRefCounter;
            el.setAttribute(REF_ATTR, ref);
        }
        return ref;
    }

    function byRef(ref) {
        return document.querySelector('[' + REF_ATTR + '="' + CSS.escape(ref) + '"]');
    }

    function cleanText(str, max) {
        if (!str) return '';
        return str.replace(/\s+/g, ' ').trim().substring(0, max || 80);
    }

    function isHidden(el) {
        if (el.hidden || el.getAttribute('aria-hidden') === 'true') return true;
        const style = window.getComputedStyle(el);
        return style.display === 'none' || style.visibility === 'hidden';
    }

    function roleOf(el) {
        const explicit = el.getAttribute('role');
        if (explicit) return explicit.split(/\s+/)[0];
        const tag = el.tagName.toLowerCase();
        switch (tag) {
            case 'a': return el.hasAttribute('href') ? 'link' : 'generic';
            case 'button': case 'summary': return 'button';
            case 'select': return el.multiple ? 'listbox' : 'combobox';
            case 'textarea': return 'textbox';
            case 'option': return 'option';
            case 'img': return 'img';
            case 'nav': return 'navigation';
            case 'main': return 'main';
            case 'header': return 'banner';
            case 'footer': return 'contentinfo';
            case 'form': return 'form';
            case 'dialog': return 'dialog';
            case 'ul': case 'ol': return 'list';
            case 'li': return 'listitem';
            case 'table': return 'table';
            case 'tr': return 'row';
            case 'td': return 'cell';
            case 'th': return 'columnheader';
            case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
            case 'input': {
                const type = (el.getAttribute('type') || 'text').toLowerCase();
                if (type === 'checkbox') return 'checkbox';
                if (type === 'radio') return 'radio';
                if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
                if (type === 'range') return 'slider';
                if (type === 'number') return 'spinbutton';
                if (type === 'search') return 'searchbox';
                if (type === 'hidden') return 'none';
                return 'textbox';
            }
        }
        if (el.isContentEditable) return 'textbox';
        return 'generic';
    }

    function nameOf(el) {
        const aria = el.getAttribute('aria-label');
        if (aria) return cleanText(aria);
        const labelledBy = el.getAttribute('aria-labelledby');
        if (labelledBy) {
            const text = labelledBy.split(/\s+/)
                .map(id => { const node = document.getElementById(id); return node ? node.textContent : ''; })
                .join(' ');
            if (text.trim()) return cleanText(text);
        }
        const tag = el.tagName;
        if (el.id && (tag === 'INPUT' || tag === 'SELECT' || tag === 'TEXTAREA')) {
            const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (label) return cleanText(label.textContent);
        }
        if (tag === 'IMG') return cleanText(el.getAttribute('alt'));
        if (el.placeholder) return cleanText(el.placeholder);
        if (el.title) return cleanText(el.title);
        if (tag === 'INPUT' && ['submit', 'button', 'reset'].includes(el.type)) return cleanText(el.value);
        if (tag === 'INPUT' || tag === 'SELECT' || tag === 'TEXTAREA') {
            const wrapping = el.closest('label');
            return wrapping ? cleanText(wrapping.textContent) : '';
        }
        return cleanText(el.innerText || el.textContent);
    }

    function directText(el) {
        let text = '';
        for (const node of el.childNodes) {
            if (node.nodeType === Node.TEXT_NODE) text += node.textContent;
        }
        return cleanText(text);
    }

    function isInteractive(el, role) {
        if (INTERACTIVE_ROLES.has(role)) return true;
        if (el.isContentEditable) return true;
        return el.hasAttribute('onclick') || (el.hasAttribute('tabindex') && el.tabIndex >= 0);
    }
"#;

/// Renders the accessibility-style outline, one `- role "name" [ref=eN]` line
/// per node, indented by depth.
const SNAPSHOT_JS: &str = r#"
((maxDepth, interactiveOnly, rootRef) => {
    const root = rootRef === null ? (document.body || document.documentElement) : byRef(rootRef);
    if (!root) return null;
    const lines = [];

    function describe(el, role) {
        const name = role === 'generic' ? directText(el) : nameOf(el);
        let line = role;
        if (name) line += ' ' + JSON.stringify(name);
        if (role === 'heading') line += ' [level=' + el.tagName.substring(1) + ']';
        if (role === 'checkbox' || role === 'radio') line += el.checked ? ' [checked]' : '';
        if ((role === 'textbox' || role === 'searchbox' || role === 'spinbutton' || role === 'combobox') && el.value) {
            line += ' [value=' + JSON.stringify(cleanText(el.value, 60)) + ']';
        }
        if (el.disabled) line += ' [disabled]';
        line += ' [ref=' + refOf(el) + ']';
        if (role === 'link' && el.getAttribute('href')) line += ' [href=' + el.getAttribute('href') + ']';
        return line;
    }

    function walk(el, level) {
        if (SKIP_TAGS.has(el.tagName) || isHidden(el)) return;
        const role = roleOf(el);
        const interactive = isInteractive(el, role);
        const include = interactiveOnly
            ? interactive
            : (role !== 'generic' && role !== 'none') || directText(el) !== '';

        let childLevel = level;
        if (include) {
            if (maxDepth !== null && level > maxDepth) return;
            lines.push('  '.repeat(level) + '- ' + describe(el, role));
            if (LEAF_ROLES.has(role)) return;
            childLevel = level + 1;
        }
        if (maxDepth !== null && childLevel > maxDepth) return;
        for (const child of el.children) walk(child, childLevel);
        if (el.shadowRoot) {
            for (const child of el.shadowRoot.children) walk(child, childLevel);
        }
    }

    walk(root, 0);
    return { title: document.title || '', url: window.location.href, snapshot: lines.join('\n') };
})
"#;

/// Scores visible candidates by how many query tokens their name, role and
/// common attributes contain.
const FIND_JS: &str = r#"
((query, limit) => {
    const tokens = query.toLowerCase().split(/\s+/).filter(Boolean);
    const phrase = tokens.join(' ');
    const results = [];
    const candidates = document.querySelectorAll(
        'a, button, input, select, textarea, summary, label, img[alt], h1, h2, h3, h4, h5, h6, ' +
        '[role], [onclick], [tabindex], [contenteditable="true"]'
    );

    for (const el of candidates) {
        if (isHidden(el)) continue;
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 && rect.height === 0) continue;
        const role = roleOf(el);
        if (role === 'none') continue;

        const name = nameOf(el);
        const haystack = [
            name, role,
            el.getAttribute('placeholder') || '',
            el.getAttribute('name') || '',
            el.getAttribute('title') || '',
            el.id || ''
        ].join(' ').toLowerCase();

        let matched = 0;
        for (const token of tokens) {
            if (haystack.includes(token)) matched++;
        }
        if (matched === 0) continue;

        let score = matched / tokens.length;
        const lowered = name.toLowerCase();
        if (lowered === phrase) score += 1;
        else if (lowered.includes(phrase)) score += 0.5;
        if (isInteractive(el, role)) score += 0.25;

        results.push({ ref: refOf(el), role, name, score: Math.round(score * 1000) / 1000 });
    }

    results.sort((a, b) => b.score - a.score);
    return results.slice(0, limit);
})
"#;

/// Viewport centre of the element and whether that point is on screen.
const RESOLVE_REF_JS: &str = r#"
((ref) => {
    const el = byRef(ref);
    if (!el) return null;
    const rect = el.getBoundingClientRect();
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const visible = rect.width > 0 && rect.height > 0
        && x >= 0 && y >= 0 && x <= window.innerWidth && y <= window.innerHeight;
    return { x, y, visible };
})
"#;

const SCROLL_INTO_VIEW_JS: &str = r#"
((ref) => {
    const el = byRef(ref);
    if (!el) return false;
    el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
    return true;
})
"#;

/// Sets a field through the native value setter so framework-managed inputs
/// observe the change, then fires `input` and `change`.
const SET_FORM_VALUE_JS: &str = r#"
((ref, value) => {
    const el = byRef(ref);
    if (!el) return null;
    const tag = el.tagName.toLowerCase();
    const fire = () => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };

    if (tag === 'select') {
        const option = Array.from(el.options).find(o => o.value === value || o.text.trim() === value);
        if (!option) return { success: false, elementType: 'select', error: 'No option matching ' + JSON.stringify(value) };
        el.value = option.value;
        fire();
        return { success: true, elementType: 'select' };
    }

    if (tag === 'input' && (el.type === 'checkbox' || el.type === 'radio')) {
        const wanted = ['true', 'on', '1', 'yes', 'checked'].includes(String(value).toLowerCase());
        if (el.checked !== wanted) el.click();
        return { success: true, elementType: el.type };
    }

    if (tag === 'input' || tag === 'textarea') {
        const elementType = tag === 'input' ? (el.type || 'text') : 'textarea';
        if (el.disabled || el.readOnly) return { success: false, elementType, error: 'Element is not editable' };
        const proto = tag === 'input' ? HTMLInputElement.prototype : HTMLTextAreaElement.prototype;
        const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
        el.focus();
        setter.call(el, value);
        fire();
        return { success: true, elementType };
    }

    if (el.isContentEditable) {
        el.focus();
        el.textContent = value;
        el.dispatchEvent(new Event('input', { bubbles: true }));
        return { success: true, elementType: 'contenteditable' };
    }

    return { success: false, elementType: tag, error: 'Element is not a form field' };
})
"#;

const TEXT_PRESENT_JS: &str = r#"
((text) => {
    const body = document.body;
    return !!body && (body.innerText || body.textContent || '').includes(text);
})
"#;

/// Encodes a string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
	serde_json::Value::String(value.to_owned()).to_string()
}

/// CSS selector matching the element that carries `reference`.
pub fn ref_selector(reference: &str) -> String {
	format!("[{REF_ATTRIBUTE}={}]", js_string(reference))
}

fn invoke(body: &str, args: &[String]) -> String {
	format!(
		"(() => {{{HELPERS_JS}\n    return ({})({});\n}})()",
		body.trim(),
		args.join(", ")
	)
}

pub fn snapshot(depth: Option<u32>, filter: SnapshotFilter, root_ref: Option<&str>) -> String {
	let depth = depth.map_or_else(|| "null".to_string(), |d| d.to_string());
	let interactive = (filter == SnapshotFilter::Interactive).to_string();
	let root = root_ref.map_or_else(|| "null".to_string(), js_string);
	invoke(SNAPSHOT_JS, &[depth, interactive, root])
}

pub fn find_elements(query: &str, limit: usize) -> String {
	invoke(FIND_JS, &[js_string(query), limit.to_string()])
}

pub fn resolve_ref(reference: &str) -> String {
	invoke(RESOLVE_REF_JS, &[js_string(reference)])
}

pub fn scroll_into_view(reference: &str) -> String {
	invoke(SCROLL_INTO_VIEW_JS, &[js_string(reference)])
}

pub fn set_form_value(reference: &str, value: &str) -> String {
	invoke(SET_FORM_VALUE_JS, &[js_string(reference), js_string(value)])
}

pub fn text_present(text: &str) -> String {
	invoke(TEXT_PRESENT_JS, &[js_string(text)])
}
