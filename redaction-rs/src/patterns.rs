//! Compiled PII patterns.
//!
//! A pattern may define a capture group named `pii`; when it does, only that
//! group is replaced and the surrounding keyword is kept ("CPF: [CPF]").
//! None of these patterns can match brackets or an all-uppercase word
//! followed by `]`, so placeholders are never matched again.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub(crate) static ref EMAIL: Vec<Regex> = vec![
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}").unwrap(),
    ];

    pub(crate) static ref PROTOCOL: Vec<Regex> = vec![
        Regex::new(r"(?i:\bprotocolo\b)[ \t]*(?:[nN][º°oO]\.?[ \t]*)?:?[ \t]*(?P<pii>\d(?:[\d./-]*\d)?)").unwrap(),
    ];

    pub(crate) static ref CHASSIS: Vec<Regex> = vec![
        Regex::new(r"(?i:\bchassis?\b)[ \t]*(?:[nN][º°oO]\.?[ \t]*)?:?[ \t]*(?P<pii>[A-HJ-NPR-Z0-9]{6,17})\b").unwrap(),
        // Full 17-character VIN without a keyword
        Regex::new(r"\b[A-HJ-NPR-Z0-9]{17}\b").unwrap(),
    ];

    pub(crate) static ref CPF: Vec<Regex> = vec![
        Regex::new(r"\b\d{3}\.\d{3}\.\d{3}[-.]\d{2}\b").unwrap(),
        Regex::new(r"\b\d{9}-\d{2}\b").unwrap(),
        Regex::new(r"(?i:\bcpf\b)[ \t]*:?[ \t]*(?P<pii>\d{11})\b").unwrap(),
    ];

    pub(crate) static ref PLATE: Vec<Regex> = vec![
        Regex::new(r"\b[A-Z]{3}[- ]?\d{4}\b").unwrap(),
        // Mercosul format
        Regex::new(r"\b[A-Z]{3}\d[A-Z]\d{2}\b").unwrap(),
    ];

    pub(crate) static ref PHONE: Vec<Regex> = vec![
        Regex::new(r"\+55[ ]?(?:\(\d{2}\)|\d{2})[ -]?\d{4,5}[- ]?\d{4}\b").unwrap(),
        Regex::new(r"\(\d{2}\)[ ]?\d{4,5}[- ]?\d{4}\b").unwrap(),
        Regex::new(r"\b\d{2}[ -]\d{4,5}[- ]?\d{4}\b").unwrap(),
        Regex::new(r"\b\d{4,5}-\d{4}\b").unwrap(),
        Regex::new(r"\b\d{10,11}\b").unwrap(),
    ];

    /// A capitalised word sequence counts as a name only after a phrase that
    /// introduces a person, or when it opens with a common given name and
    /// carries a surname. Brands, places and sentence-start pairs are left alone.
    pub(crate) static ref NAME: Vec<Regex> = vec![
        Regex::new(&format!(
            r"(?i:\b(?:{}))\.?(?:[ \t]*:)?[ \t]+(?P<pii>{})\b",
            NAME_INTRODUCERS.join("|"),
            NAME_SEQUENCE
        ))
        .unwrap(),
        Regex::new(&format!(
            r"\b(?:{}){}\b",
            GIVEN_NAMES.join("|"),
            SURNAME_TAIL
        ))
        .unwrap(),
    ];
}

/// One or more capitalised words, joined by the usual particles
const NAME_SEQUENCE: &str = r"\p{Lu}\p{Ll}+(?:(?:[ \t]+(?:d[aeo]s?|e))?[ \t]+\p{Lu}\p{Ll}+)*";

/// At least one further capitalised word after a given name
const SURNAME_TAIL: &str = r"(?:(?:[ \t]+(?:d[aeo]s?|e))?[ \t]+\p{Lu}\p{Ll}+)+";

const NAME_INTRODUCERS: &[&str] = &[
    r"meu nome é",
    r"me chamo",
    r"sr",
    r"sra",
    r"srta",
    r"senhora?",
    r"cliente",
    r"atendente",
    r"consultora?",
    r"vendedora?",
    r"gerente",
    r"técnic[oa]",
    r"mecânic[oa]",
    r"falei com",
    r"fale com",
    r"atendid[oa] (?:pel[oa]|por)",
];

const GIVEN_NAMES: &[&str] = &[
    "Adriana", "Alexandre", "Aline", "Amanda", "Ana", "André", "Antônio", "Beatriz", "Bruna",
    "Bruno", "Camila", "Carla", "Carlos", "Cláudia", "Daniel", "Daniela", "Diego", "Eduardo",
    "Fabiana", "Felipe", "Fernanda", "Fernando", "Francisco", "Gabriel", "Gabriela", "Gustavo",
    "Helena", "Isabela", "Jéssica", "João", "Jorge", "José", "Juliana", "Larissa", "Leonardo",
    "Letícia", "Lucas", "Luciana", "Luís", "Luiz", "Marcelo", "Marcos", "Maria", "Mariana",
    "Mateus", "Paula", "Paulo", "Pedro", "Rafael", "Renata", "Ricardo", "Roberto", "Rodrigo",
    "Sandra", "Sérgio", "Tatiana", "Thiago", "Tiago", "Vanessa", "Vinícius",
];
