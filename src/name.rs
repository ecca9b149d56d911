#![allow(non_snake_case, non_upper_case_globals)]

/**
Maps between the restricted character set of an XML element tag and the
unrestricted filenames they stand in for inside the manifest.

The two escapes, in "tag to filename" order, are:

Escape | tag side | filename side
---|---|---
0 | `_E` | `.`
1 | `__` | `_`

`fix_name` applies them in this order; `sanitize` applies them in reverse, so
that `sanitize(fix_name(t)) == t` for any tag `t` the binary XML codec can
hand back.
*/
const ESCAPES: [(&str, &str); 2] = [("_E", "."), ("__", "_")];

/// Convert a manifest tag into the filename it represents.
pub fn fix_name(tag: &str) -> String
{
	let mut n = tag.to_string();
	for (from, to) in ESCAPES
	{
		n = n.replace(from, to);
	}

	let mut chars = n.chars();
	if let (Some('_'), Some(second)) = (chars.next(), chars.next())
	{
		if second.is_ascii_digit()
		{
			n.remove(0);
		}
	}

	return n;
}

/// Convert a filename into the tag used for it inside the manifest.
pub fn sanitize(name: &str) -> String
{
	let mut n = name.to_string();
	for (from, to) in ESCAPES.iter().rev()
	{
		n = n.replace(to, from);
	}

	if n.starts_with(|c: char| c.is_ascii_digit())
	{
		n = format!("_{}", n);
	}

	return n;
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn fix_name_applies_escapes_in_order()
	{
		assert_eq!("1file.png", fix_name("_1file_Epng"));
		assert_eq!("a_b.c", fix_name("a__b_Ec"));
	}

	#[test]
	fn sanitize_applies_escapes_reversed()
	{
		assert_eq!("_1file_Epng", sanitize("1file.png"));
		assert_eq!("a__b_Ec", sanitize("a_b.c"));
	}

	#[test]
	fn round_trip_sanitize_after_fix_name()
	{
		for tag in ["_1file_Epng", "a__b_Ec", "imgfs", "texturelist_Exml"]
		{
			assert_eq!(tag, sanitize(&fix_name(tag)));
		}
	}

	#[test]
	fn fix_name_keeps_leading_underscore_when_not_followed_by_digit()
	{
		// "_super_" has no further escapes to apply and "s" isn't a digit,
		// so the leading underscore survives.
		assert_eq!("_super_", fix_name("_super_"));
	}

	#[test]
	fn sanitize_prepends_underscore_for_any_leading_digit()
	{
		assert_eq!("_0start", sanitize("0start"));
	}
}
