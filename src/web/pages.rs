//! Inline HTML for the handful of pages the app serves.

use axum::response::Html;

use super::CartItem;
use crate::users::User;

/// Escapes text for use in HTML content and quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="es">
    <head>
        <meta charset="utf-8">
        <title>{title}</title>
    </head>
    <body>
        <h1>{title}</h1>
        {body}
    </body>
</html>
"#
    ))
}

pub fn register_form() -> Html<String> {
    layout(
        "Registro",
        r#"<form method="post" action="/register">
            <label>Email <input type="email" name="email" required></label>
            <label>Contraseña <input type="password" name="password" required></label>
            <label>Nombre <input type="text" name="nombre" required></label>
            <label>Dirección <input type="text" name="direccion" required></label>
            <label>Edad <input type="number" name="edad" min="0" required></label>
            <label>Teléfono <input type="tel" name="telefono" required></label>
            <label>Foto <input type="text" name="fileName"></label>
            <button type="submit">Registrarse</button>
        </form>
        <p><a href="/login">Ya tengo cuenta</a></p>"#,
    )
}

pub fn login_form() -> Html<String> {
    layout(
        "Ingreso",
        r#"<form method="post" action="/login">
            <label>Email <input type="email" name="email" required></label>
            <label>Contraseña <input type="password" name="password" required></label>
            <button type="submit">Ingresar</button>
        </form>
        <p><a href="/register">Crear cuenta</a></p>"#,
    )
}

pub fn error_page(message: &str, return_path: &str, file_name: Option<&str>) -> Html<String> {
    let photo = match file_name.filter(|name| !name.is_empty()) {
        Some(name) => format!("<p>Foto cargada: {}</p>", escape(name)),
        None => String::new(),
    };
    layout(
        "Error",
        &format!(
            r#"<p class="error">{}</p>
        {photo}
        <p><a href="{}">Volver</a></p>"#,
            escape(message),
            escape(return_path),
        ),
    )
}

pub fn home(user: &User) -> Html<String> {
    layout(
        "Inicio",
        &format!(
            r#"<p>Bienvenido, {}</p>
        <ul>
            <li>Email: {}</li>
            <li>Teléfono: {}</li>
            <li>Dirección: {}</li>
        </ul>
        <img src="/uploads/{}" alt="Foto de perfil">
        <p><a href="/cart">Carrito</a> | <a href="/logout">Salir</a></p>"#,
            escape(&user.name),
            escape(&user.email),
            escape(&user.phone),
            escape(&user.address),
            escape(&user.photo),
        ),
    )
}

pub fn cart(items: &[CartItem]) -> Html<String> {
    let rows = if items.is_empty() {
        "<p>El carrito está vacío</p>".to_owned()
    } else {
        let lines: String = items
            .iter()
            .map(|item| {
                format!(
                    "<li>{} x {}</li>",
                    escape(&item.product),
                    item.quantity
                )
            })
            .collect();
        format!("<ul>{lines}</ul>")
    };
    layout(
        "Carrito",
        &format!(
            r#"{rows}
        <form method="post" action="/cart">
            <label>Producto <input type="text" name="product" required></label>
            <label>Cantidad <input type="number" name="quantity" min="1" value="1"></label>
            <button type="submit">Agregar</button>
        </form>
        <form method="post" action="/cart/clear"><button type="submit">Vaciar</button></form>
        <p><a href="/home">Inicio</a></p>"#
        ),
    )
}

pub fn server_error() -> Html<String> {
    layout(
        "Error",
        r#"<p>Ocurrió un error inesperado, intentá de nuevo más tarde.</p>
        <p><a href="/login">Volver</a></p>"#,
    )
}
